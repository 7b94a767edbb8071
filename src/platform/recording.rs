//! In-memory [`ChatPlatform`] used by the relay tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::platform::{ChatId, ChatPlatform};

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(ChatId, String),
    File {
        chat_id: ChatId,
        name: String,
        path: PathBuf,
        /// Contents read at send time, while the file still exists
        contents: String,
    },
}

#[derive(Default)]
pub struct RecordingPlatform {
    sent: Mutex<Vec<Sent>>,
    typing: Mutex<Vec<ChatId>>,
    fail_sends: bool,
    unreadable_uploads: bool,
}

impl RecordingPlatform {
    /// A platform whose every send fails like a dropped connection
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    /// A platform that cannot read any file handed to `send_file`
    pub fn unreadable_uploads() -> Self {
        Self {
            unreadable_uploads: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn typing(&self) -> Vec<ChatId> {
        self.typing.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), RelayError> {
        if self.fail_sends {
            return Err(RelayError::Transport("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), RelayError> {
        self.check()?;
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Text(chat_id, text.to_string()));
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: ChatId,
        name: &str,
        path: &Path,
    ) -> Result<(), RelayError> {
        self.check()?;
        if self.unreadable_uploads {
            return Err(RelayError::Storage(std::io::Error::other("artifact unreadable")));
        }
        let contents = std::fs::read_to_string(path)?;
        self.sent.lock().unwrap().push(Sent::File {
            chat_id,
            name: name.to_string(),
            path: path.to_path_buf(),
            contents,
        });
        Ok(())
    }

    async fn send_typing(&self, chat_id: ChatId) -> Result<(), RelayError> {
        self.check()?;
        self.typing.lock().unwrap().push(chat_id);
        Ok(())
    }
}
