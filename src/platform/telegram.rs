use std::path::Path;

use async_trait::async_trait;
use futures::Stream;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::platform::{self, ChatPlatform, IncomingUpdate};

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

fn transport(e: teloxide::RequestError) -> RelayError {
    RelayError::Transport(e.to_string())
}

/// teloxide reports a local file it cannot read as `Io`; that is the
/// artifact's fault, not the connection's.
fn upload_error(e: teloxide::RequestError) -> RelayError {
    match e {
        teloxide::RequestError::Io(io) => {
            RelayError::Storage(std::io::Error::new(io.kind(), io.to_string()))
        }
        other => transport(other),
    }
}

/// [`ChatPlatform`] backed by the Telegram Bot API
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    async fn send_text(&self, chat_id: platform::ChatId, text: &str) -> Result<(), RelayError> {
        for chunk in split_message(text, 4000) {
            self.bot
                .send_message(ChatId(chat_id.0), chunk)
                .await
                .map_err(transport)?;
        }
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: platform::ChatId,
        name: &str,
        path: &Path,
    ) -> Result<(), RelayError> {
        let document = InputFile::file(path.to_path_buf()).file_name(name.to_string());
        self.bot
            .send_document(ChatId(chat_id.0), document)
            .await
            .map_err(upload_error)?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: platform::ChatId) -> Result<(), RelayError> {
        self.bot
            .send_chat_action(ChatId(chat_id.0), ChatAction::Typing)
            .await
            .map_err(transport)?;
        Ok(())
    }
}

fn to_incoming(msg: &Message) -> IncomingUpdate {
    IncomingUpdate::message(
        platform::ChatId(msg.chat.id.0),
        msg.from.as_ref().map(|user| user.id.0.to_string()),
        msg.text().map(str::to_string),
    )
}

async fn forward_message(msg: Message, tx: mpsc::Sender<IncomingUpdate>) -> ResponseResult<()> {
    if tx.send(to_incoming(&msg)).await.is_err() {
        warn!("Relay loop is gone, dropping message {}", msg.id.0);
    }
    Ok(())
}

/// Start long polling on a background task and expose the updates as a stream.
///
/// The stream ends when the dispatcher stops (Ctrl-C).
pub fn listen(bot: Bot, capacity: usize) -> impl Stream<Item = IncomingUpdate> + Send {
    let (tx, rx) = mpsc::channel(capacity);
    let unhandled_tx = tx.clone();

    tokio::spawn(async move {
        info!("Starting Telegram platform...");

        let handler = Update::filter_message().endpoint(forward_message);

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![tx])
            .default_handler(move |upd| {
                let tx = unhandled_tx.clone();
                async move {
                    debug!("Non-message update: {:?}", upd.id);
                    tx.send(IncomingUpdate::default()).await.ok();
                }
            })
            .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Telegram dispatcher stopped");
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|update| (update, rx))
    })
}
