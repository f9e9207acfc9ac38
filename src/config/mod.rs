//! Configuration module.
//!
//! Loads configuration from environment variables. Required variables
//! terminate startup with a descriptive message; secrets are never logged.

use std::env;
use std::time::Duration;

use serde::Deserialize;

/// How long a repeated identical submission is treated as a duplicate.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(120);

/// How long finished jobs stay visible to `/status` before eviction.
pub const FINISHED_RETENTION: Duration = Duration::from_secs(60);

/// Bot running mode
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    /// Chats allowed to use the bot (comma-separated ids).
    /// Empty means the bot answers everyone.
    pub allowed_chat_ids: Vec<i64>,

    // Aria2
    pub rpc_url: String,
    pub rpc_secret: Option<String>,
    pub download_dir: Option<String>,
    pub rpc_timeout: Duration,

    // Bridge behavior
    pub max_concurrent_downloads: usize,
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if required environment variables are not set.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let bot_mode = env::var("BOT_MODE")
            .unwrap_or_else(|_| "polling".to_string())
            .to_lowercase();

        let bot_mode = match bot_mode.as_str() {
            "webhook" => BotMode::Webhook,
            _ => BotMode::Polling,
        };

        let webhook_url = env::var("WEBHOOK_URL").ok();

        // Validate webhook URL is set if mode is webhook
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            panic!("WEBHOOK_URL must be set when BOT_MODE is webhook");
        }

        let webhook_port = env::var("WEBHOOK_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8443);

        let webhook_secret = env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());

        let allowed_chat_ids = env::var("ALLOWED_CHAT_IDS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse::<i64>().ok())
            .collect();

        let rpc_secret = env::var("ARIA2_RPC_SECRET").ok().filter(|s| !s.is_empty());
        let download_dir = env::var("DOWNLOAD_DIR").ok().filter(|s| !s.is_empty());

        Self {
            bot_token: env::var("BOT_TOKEN").expect("BOT_TOKEN must be set"),
            bot_mode,
            webhook_url,
            webhook_port,
            webhook_secret,
            allowed_chat_ids,
            rpc_url: env::var("ARIA2_RPC_URL")
                .unwrap_or_else(|_| "http://localhost:6800/jsonrpc".to_string()),
            rpc_secret,
            download_dir,
            rpc_timeout: Duration::from_secs(parse_env_or("RPC_TIMEOUT_SECS", 30)),
            max_concurrent_downloads: parse_env_or("MAX_CONCURRENT_DOWNLOADS", 5) as usize,
            poll_interval: Duration::from_secs(parse_env_or("POLL_INTERVAL_SECS", 10)),
        }
    }
}

fn parse_env_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
