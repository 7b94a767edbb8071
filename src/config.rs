use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::formatter::DeliveryMode;

/// Environment variable holding the Telegram bot token.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub prover: ProverConfig,
    pub delivery: DeliveryConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProverConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub mode: DeliveryMode,
    /// Where temporary proof files are written before upload
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Updates buffered between the Telegram dispatcher and the relay loop
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// On-disk shape: every section is optional, the token is not stored here.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    prover: Option<ProverConfig>,
    #[serde(default)]
    delivery: Option<DeliveryConfig>,
    #[serde(default)]
    relay: Option<RelayConfig>,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_directory() -> PathBuf {
    std::env::temp_dir()
}

fn default_max_concurrent_requests() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            directory: default_directory(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Config {
    /// Load settings from `path` (if it exists) and the bot token from the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?
        } else {
            String::new()
        };

        Self::from_parts(&content, std::env::var(TOKEN_ENV).ok())
    }

    pub fn from_parts(content: &str, bot_token: Option<String>) -> Result<Self> {
        let file: FileConfig = toml::from_str(content).context("Failed to parse config file")?;

        let bot_token = bot_token
            .filter(|t| !t.trim().is_empty())
            .with_context(|| format!("{} is not set", TOKEN_ENV))?;

        let config = Config {
            telegram: TelegramConfig { bot_token },
            prover: file.prover.unwrap_or_default(),
            delivery: file.delivery.unwrap_or_default(),
            relay: file.relay.unwrap_or_default(),
        };

        if config.prover.timeout_secs == 0 {
            anyhow::bail!("prover.timeout_secs must be greater than 0");
        }
        if config.relay.max_concurrent_requests == 0 {
            anyhow::bail!("relay.max_concurrent_requests must be greater than 0");
        }
        if config.relay.queue_capacity == 0 {
            anyhow::bail!("relay.queue_capacity must be greater than 0");
        }

        Ok(config)
    }
}
