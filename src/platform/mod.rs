pub mod telegram;

#[cfg(test)]
pub mod recording;

use std::path::Path;

use async_trait::async_trait;

use crate::error::RelayError;

/// Platform-neutral chat identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// One inbound event from the chat platform
#[derive(Debug, Clone, Default)]
pub struct IncomingUpdate {
    /// Absent for updates that carry no user message (edits, callbacks, ...)
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    /// Platform-specific user ID as string
    pub sender_id: Option<String>,
    pub text: Option<String>,
}

impl IncomingUpdate {
    pub fn message(chat_id: ChatId, sender_id: Option<String>, text: Option<String>) -> Self {
        Self {
            message: Some(IncomingMessage {
                chat_id,
                sender_id,
                text,
            }),
        }
    }
}

/// Outbound half of the chat platform.
///
/// Errors are [`RelayError::Transport`], except that `send_file` reports a
/// file it cannot read as [`RelayError::Storage`].
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), RelayError>;

    /// Upload `path` as a document named `name`.
    async fn send_file(&self, chat_id: ChatId, name: &str, path: &Path)
        -> Result<(), RelayError>;

    async fn send_typing(&self, chat_id: ChatId) -> Result<(), RelayError>;
}
