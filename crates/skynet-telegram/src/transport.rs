//! Concrete `skynet_agent::Transport` over a teloxide `Bot`.
//!
//! HTML rendering tries the Markdown→HTML conversion first; if Telegram
//! rejects the markup (unbalanced tag, unsupported entity), we retry once as
//! plain text rather than dropping the message — the same policy
//! `send::send_response` uses for ordinary chunked replies.

use std::path::PathBuf;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, MessageId, ParseMode, ReactionType};
use tracing::debug;

use skynet_agent::transport::{MessageHandle, Transport, TransportError};
use skynet_core::config::MAX_MESSAGE_LEN;

use crate::markdown;

pub struct TelegramTransport {
    bot: Bot,
    download_dir: PathBuf,
}

impl TelegramTransport {
    pub fn new(bot: Bot, download_dir: PathBuf) -> Self {
        Self { bot, download_dir }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn max_message_len(&self) -> usize {
        MAX_MESSAGE_LEN - 6
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<MessageHandle, TransportError> {
        let html = markdown::to_html(text);
        let sent = self
            .bot
            .send_message(ChatId(chat_id), &html)
            .parse_mode(ParseMode::Html)
            .await;

        let msg = match sent {
            Ok(msg) => msg,
            Err(e) => {
                debug!(%e, "Telegram: HTML send failed, retrying as plain text");
                self.bot
                    .send_message(ChatId(chat_id), text)
                    .await
                    .map_err(|e| e.to_string())?
            }
        };
        Ok(MessageHandle(msg.id.0.to_string()))
    }

    async fn edit(&self, chat_id: i64, handle: &MessageHandle, text: &str) -> Result<(), TransportError> {
        let message_id = parse_message_id(handle)?;
        let html = markdown::to_html(text);
        let edited = self
            .bot
            .edit_message_text(ChatId(chat_id), message_id, &html)
            .parse_mode(ParseMode::Html)
            .await;

        if edited.is_err() {
            debug!("Telegram: HTML edit failed, retrying as plain text");
            self.bot
                .edit_message_text(ChatId(chat_id), message_id, text)
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    async fn delete(&self, chat_id: i64, handle: &MessageHandle) -> Result<(), TransportError> {
        let message_id = parse_message_id(handle)?;
        self.bot
            .delete_message(ChatId(chat_id), message_id)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn react(&self, chat_id: i64, message_id: i64, emoji: Option<&str>) -> Result<(), TransportError> {
        let reaction = match emoji {
            Some(e) => vec![ReactionType::Emoji { emoji: e.to_string() }],
            None => vec![],
        };
        self.bot
            .set_message_reaction(ChatId(chat_id), MessageId(message_id as i32))
            .reaction(reaction)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn send_file(&self, chat_id: i64, path: &std::path::Path, caption: Option<&str>) -> Result<(), TransportError> {
        use teloxide::types::InputFile;
        let mut req = self.bot.send_document(ChatId(chat_id), InputFile::file(path));
        if let Some(c) = caption {
            req = req.caption(c);
        }
        req.await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn send_photo(&self, chat_id: i64, path: &std::path::Path, caption: Option<&str>) -> Result<(), TransportError> {
        use teloxide::types::InputFile;
        let mut req = self.bot.send_photo(ChatId(chat_id), InputFile::file(path));
        if let Some(c) = caption {
            req = req.caption(c);
        }
        req.await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn download_media(&self, file_id: &str) -> Result<PathBuf, TransportError> {
        let file = self.bot.get_file(file_id).await.map_err(|e| e.to_string())?;
        std::fs::create_dir_all(&self.download_dir).map_err(|e| e.to_string())?;
        let ext = std::path::Path::new(&file.path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let dest = self.download_dir.join(format!("{file_id}.{ext}"));
        let mut out = tokio::fs::File::create(&dest).await.map_err(|e| e.to_string())?;
        self.bot
            .download_file(&file.path, &mut out)
            .await
            .map_err(|e| e.to_string())?;
        Ok(dest)
    }

    async fn typing(&self, chat_id: i64) -> Result<(), TransportError> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

fn parse_message_id(handle: &MessageHandle) -> Result<MessageId, TransportError> {
    handle
        .0
        .parse::<i32>()
        .map(MessageId)
        .map_err(|_| format!("invalid message handle: {}", handle.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_handle() {
        let handle = MessageHandle("123".to_string());
        assert_eq!(parse_message_id(&handle).unwrap(), MessageId(123));
    }

    #[test]
    fn rejects_non_numeric_handle() {
        let handle = MessageHandle("not-a-number".to_string());
        assert!(parse_message_id(&handle).is_err());
    }
}
