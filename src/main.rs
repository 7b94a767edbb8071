mod bot;
mod commands;
mod config;
mod error;
mod formatter;
mod platform;
mod prover;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::UpdateLoop;
use crate::commands::CommandDispatcher;
use crate::config::Config;
use crate::formatter::ResultFormatter;
use crate::platform::telegram::{self, TelegramPlatform};
use crate::platform::ChatPlatform;
use crate::prover::ProofClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,proofbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Prover: {}", config.prover.base_url);
    info!("  Delivery: {:?}", config.delivery.mode);
    info!("  Max concurrent requests: {}", config.relay.max_concurrent_requests);

    let bot = Bot::new(&config.telegram.bot_token);
    let me = bot
        .get_me()
        .await
        .context("Failed to authorize with Telegram")?;
    info!("Authorized on account @{}", me.username());

    let platform: Arc<dyn ChatPlatform> = Arc::new(TelegramPlatform::new(bot.clone()));
    let prover = ProofClient::new(&config.prover)?;
    let formatter = ResultFormatter::new(config.delivery.mode, config.delivery.directory.clone());
    let dispatcher = CommandDispatcher::new(prover, formatter, platform.clone());
    let relay = UpdateLoop::new(platform, dispatcher, config.relay.max_concurrent_requests)
        .with_bot_username(me.username());

    info!("Bot is starting...");
    let updates = telegram::listen(bot, config.relay.queue_capacity);
    relay
        .run(updates)
        .await
        .context("Telegram transport failed")?;

    Ok(())
}
