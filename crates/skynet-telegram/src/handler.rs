//! Telegram message handler registered in the teloxide Dispatcher.
//!
//! Runs for every incoming `Message`. There is no allowlist beyond the one
//! configured principal and no per-chat session derivation — the active
//! session is whatever `SessionManager::current` returns, the same session
//! every command and every turn operates against until `/switch` or `/new`
//! changes it.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::MediaKind;
use tracing::warn;

use skynet_agent::transport::Transport;
use skynet_agent::turn::{process_turn, BusySet};

use crate::commands;
use crate::context::BridgeContext;
use crate::principal::{self, Gate};
use crate::send;
use crate::transport::TelegramTransport;

pub async fn handle_message<C: BridgeContext + 'static>(
    msg: Message,
    bot: Bot,
    ctx: Arc<C>,
    busy: Arc<BusySet>,
    transport: Arc<TelegramTransport>,
) -> ResponseResult<()> {
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    match principal::check(ctx.principal(), from.id.0 as i64, from.username.as_deref()) {
        Gate::Allowed => {}
        Gate::Denied => return Ok(()),
        Gate::Discover { reply } => {
            send::send_response(&bot, msg.chat.id, &reply).await;
            return Ok(());
        }
    }

    let text = msg.text().or(msg.caption()).unwrap_or("").to_string();

    let Some(session) = ctx.sessions().current().or_else(|| ctx.sessions().list_all().into_iter().next()) else {
        send::send_response(&bot, msg.chat.id, "No session yet. Use /new <name> to create one.").await;
        return Ok(());
    };

    if text.starts_with('/') {
        let reply = commands::dispatch(ctx.as_ref(), transport.as_ref(), msg.chat.id.0, &session, &text)
            .await
            .unwrap_or_else(|| format!("Unknown command: `{}`. Try /help.", text.split_whitespace().next().unwrap_or("/?")));
        send::send_response(&bot, msg.chat.id, &reply).await;
        return Ok(());
    }

    let downloaded = download_attachment(&msg, transport.as_ref()).await;
    let user_text = match (text.is_empty(), downloaded) {
        (false, _) => text,
        (true, Some(path)) => format!("[attachment: {}]", path.display()),
        (true, None) => return Ok(()),
    };

    let message_id = msg.id.0 as i64;
    let chat_id = msg.chat.id.0;
    let user_id = from.id.0.to_string();

    process_turn(
        ctx.as_ref(),
        busy.as_ref(),
        &session,
        chat_id,
        message_id,
        &user_text,
        Some(&user_id),
        transport.clone() as Arc<dyn Transport>,
    )
    .await;

    Ok(())
}

/// Download whatever media is attached to `msg`, if any — photo, document,
/// voice note, video, or audio all share the one `download_media` path.
async fn download_attachment(msg: &Message, transport: &TelegramTransport) -> Option<std::path::PathBuf> {
    let file_id = match &msg.kind {
        teloxide::types::MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Photo(p) => p.photo.last().map(|s| s.file.id.clone()),
            MediaKind::Document(d) => Some(d.document.file.id.clone()),
            MediaKind::Voice(v) => Some(v.voice.file.id.clone()),
            MediaKind::Video(v) => Some(v.video.file.id.clone()),
            MediaKind::Audio(a) => Some(a.audio.file.id.clone()),
            _ => None,
        },
        _ => None,
    }?;

    match transport.download_media(&file_id).await {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(error = %e, "Telegram: failed to download attachment");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    // `handle_message` needs a live `Bot` and a `BridgeContext` impl, both of
    // which live one layer up; `commands::dispatch` and `download_attachment`
    // carry their own unit coverage.
}
