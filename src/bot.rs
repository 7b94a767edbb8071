use std::sync::Arc;

use futures::{Stream, StreamExt, TryStreamExt};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::commands::{Command, CommandDispatcher};
use crate::error::RelayError;
use crate::formatter::DeliveryArtifact;
use crate::platform::{ChatId, ChatPlatform, IncomingUpdate};

/// Routes inbound updates to the command dispatcher and delivers the results
pub struct UpdateLoop {
    platform: Arc<dyn ChatPlatform>,
    dispatcher: CommandDispatcher,
    bot_username: Option<String>,
    max_concurrent: usize,
}

impl UpdateLoop {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        dispatcher: CommandDispatcher,
        max_concurrent: usize,
    ) -> Self {
        Self {
            platform,
            dispatcher,
            bot_username: None,
            max_concurrent,
        }
    }

    /// Ignore commands addressed to other bots (`/proof@other_bot`).
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Consume `updates` until the stream ends.
    ///
    /// Returns early only on a transport failure.
    pub async fn run<S>(&self, updates: S) -> Result<(), RelayError>
    where
        S: Stream<Item = IncomingUpdate>,
    {
        info!("Relay loop started");

        updates
            .map(Ok::<_, RelayError>)
            .try_for_each_concurrent(self.max_concurrent, |update| async move {
                match self.handle_update(update).await {
                    Err(e) if !e.is_fatal() => {
                        warn!("Dropping failed update: {}", e);
                        Ok(())
                    }
                    other => other,
                }
            })
            .await
            .inspect_err(|e| error!("Stopping relay loop: {}", e))?;

        info!("Update stream closed, relay loop finished");
        Ok(())
    }

    pub async fn handle_update(&self, update: IncomingUpdate) -> Result<(), RelayError> {
        let Some(message) = update.message else {
            return Ok(());
        };
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return Ok(());
        };
        if !command.is_addressed_to(self.bot_username.as_deref()) {
            debug!(
                "Ignoring /{} addressed to {:?}",
                command.name, command.addressee
            );
            return Ok(());
        }

        let span = info_span!(
            "command",
            request_id = %Uuid::new_v4(),
            name = %command.name,
            chat_id = message.chat_id.0,
        );

        async move {
            info!(
                "Command /{} from {}",
                command.name,
                message.sender_id.as_deref().unwrap_or("unknown sender")
            );

            let outcome = self
                .dispatcher
                .handle(&command, message.sender_id.as_deref(), message.chat_id)
                .await;

            let delivered = match outcome {
                Ok(artifact) => self.deliver(message.chat_id, artifact).await,
                Err(e) => Err(e),
            };

            // Non-fatal errors mean nothing was delivered, so report them instead
            match delivered {
                Ok(()) => Ok(()),
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => {
                    warn!("Command failed: {}", e);
                    self.platform
                        .send_text(message.chat_id, &e.user_message())
                        .await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn deliver(&self, chat_id: ChatId, artifact: DeliveryArtifact) -> Result<(), RelayError> {
        match artifact {
            DeliveryArtifact::Text(text) => self.platform.send_text(chat_id, &text).await,
            DeliveryArtifact::File(file) => {
                let sent = self.platform.send_file(chat_id, file.name(), file.path()).await;
                let path = file.path().to_path_buf();
                if let Err(e) = file.release() {
                    warn!("Failed to remove proof file {}: {}", path.display(), e);
                }
                sent
            }
        }
    }
}
