//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event
//! loop until the process exits.

use std::path::PathBuf;
use std::sync::Arc;

use teloxide::prelude::*;
use tracing::info;

use skynet_agent::actions::take_restart_marker;
use skynet_agent::turn::BusySet;
use skynet_core::config::TelegramConfig;

use crate::context::BridgeContext;
use crate::handler::handle_message;
use crate::send;
use crate::transport::TelegramTransport;

/// Telegram channel adapter.
///
/// Wraps a teloxide `Bot` and drives the Dispatcher event loop until the
/// process exits. Long polling — no public URL required.
pub struct TelegramAdapter<C: BridgeContext + 'static> {
    ctx: Arc<C>,
    config: TelegramConfig,
    download_dir: PathBuf,
}

impl<C: BridgeContext + 'static> TelegramAdapter<C> {
    pub fn new(config: &TelegramConfig, ctx: Arc<C>, download_dir: PathBuf) -> Self {
        Self {
            ctx,
            config: config.clone(),
            download_dir,
        }
    }

    /// Connect to Telegram and drive the long-polling loop.
    ///
    /// Never returns — runs for the lifetime of the process. If a restart
    /// marker was left behind by `/restart`, notifies the chat that the
    /// restart completed before entering the polling loop.
    pub async fn run(self) {
        let bot = Bot::new(&self.config.bot_token);

        if let Some(chat_id) = take_restart_marker() {
            send::send_response(&bot, ChatId(chat_id), "Restarted.").await;
        }

        info!("Telegram: starting long-polling dispatcher");

        let ctx = Arc::clone(&self.ctx);
        let busy = Arc::new(BusySet::new());
        let transport = Arc::new(TelegramTransport::new(bot.clone(), self.download_dir.clone()));

        let handler = Update::filter_message().endpoint(handle_message::<C>);

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![ctx, busy, transport])
            .default_handler(|_upd| async {})
            .build()
            .dispatch()
            .await;
    }
}
