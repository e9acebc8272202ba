//! Abstract messaging edge the Turn Engine drives. Implemented by the
//! Telegram adapter; kept here (rather than in the channel crate) so
//! `skynet-agent` never depends on a concrete channel.

use std::path::Path;

use async_trait::async_trait;

pub type TransportError = String;

/// An opaque handle to a message the Turn Engine can later edit or delete —
/// e.g. a streaming placeholder or a tool-status line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub String);

#[async_trait]
pub trait Transport: Send + Sync {
    /// Maximum message length this transport accepts before a send/edit
    /// must be split or truncated.
    fn max_message_len(&self) -> usize;

    /// Send a new message, returning a handle for later edit/delete.
    async fn reply(&self, chat_id: i64, text: &str) -> Result<MessageHandle, TransportError>;

    /// Edit a previously sent message in place.
    async fn edit(&self, chat_id: i64, handle: &MessageHandle, text: &str) -> Result<(), TransportError>;

    /// Delete a previously sent message.
    async fn delete(&self, chat_id: i64, handle: &MessageHandle) -> Result<(), TransportError>;

    /// Set (or clear, when `emoji` is `None`) a reaction on the user's
    /// incoming message.
    async fn react(&self, chat_id: i64, message_id: i64, emoji: Option<&str>) -> Result<(), TransportError>;

    /// Send a local file as a document attachment.
    async fn send_file(&self, chat_id: i64, path: &Path, caption: Option<&str>) -> Result<(), TransportError>;

    /// Send a local file as a photo attachment.
    async fn send_photo(&self, chat_id: i64, path: &Path, caption: Option<&str>) -> Result<(), TransportError>;

    /// Download a piece of inbound media (voice note, photo) to a local
    /// temp path, returning that path.
    async fn download_media(&self, file_id: &str) -> Result<std::path::PathBuf, TransportError>;

    /// Assert the "typing…" indicator once; the Turn Engine re-calls this
    /// on its own ~4s cadence for the duration of a turn.
    async fn typing(&self, chat_id: i64) -> Result<(), TransportError>;
}
