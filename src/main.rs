//! Ariadne - Telegram to Aria2 download bridge
//!
//! Binary entry point; the crate's modules live in the library root.

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ariadne::aria2::Aria2Client;
use ariadne::bot::dispatcher::AppState;
use ariadne::bridge::RpcBridge;
use ariadne::config::{self, Config};
use ariadne::{bot, tracker};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // Initialize logging with sensible defaults
    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ariadne=info,teloxide=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting Ariadne bot...");

    // Load configuration (terminates with a descriptive message when a
    // required variable is missing)
    let config = Config::from_env();
    info!("Configuration loaded successfully");
    info!("Bot mode: {:?}", config.bot_mode);
    info!("Aria2 RPC endpoint: {}", config.rpc_url);

    // Aria2 client with a bounded request timeout; calls fail closed
    let client = Aria2Client::new(
        config.rpc_url.clone(),
        config.rpc_secret.clone(),
        config.rpc_timeout,
    )?;

    let bridge = Arc::new(RpcBridge::new(
        client,
        config.download_dir.clone(),
        config::DEDUP_WINDOW,
    ));

    // Rebuild job state from the daemon. Not fatal: the daemon may still be
    // coming up, and submissions retry on their own.
    match bridge.reconcile().await {
        Ok(adopted) => info!("Reconciled with aria2 ({} download(s) adopted)", adopted),
        Err(err) => warn!("Startup reconciliation failed: {}", err),
    }

    // Initialize bot with Throttle for automatic rate limiting.
    // This respects Telegram's rate limits:
    // - 30 messages per second globally
    // - 1 message per second to the same chat
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());
    info!("Bot initialized with rate limiting (Throttle)");

    let me = bot.get_me().await?;
    info!("Bot username: @{}", me.username());

    if config.allowed_chat_ids.is_empty() {
        info!("No chat allowlist configured (ALLOWED_CHAT_IDS is empty)");
    } else {
        info!("Allowed chats: {:?}", config.allowed_chat_ids);
    }

    // Shared progress tracker: one loop for all jobs
    let tracker = tracker::spawn(
        bot.clone(),
        bridge.clone(),
        config.poll_interval,
        config::FINISHED_RETENTION,
    );

    let state = AppState::new(
        bridge,
        tracker.waker(),
        config.max_concurrent_downloads,
        config.allowed_chat_ids.clone(),
    );

    // Build dispatcher and run the bot
    let dispatcher = bot::build_dispatcher(bot.clone(), state);
    bot::run(&config, dispatcher, bot).await;

    tracker.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}
