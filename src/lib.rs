//! Ariadne - Telegram to Aria2 download bridge
//!
//! A Telegram bot that forwards download requests (magnet links, URLs,
//! .torrent files) to an Aria2 daemon over JSON-RPC and reports progress
//! back to the chat. Aria2 owns download execution; the bot is a thin
//! command-dispatch and progress-tracking bridge.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `aria2` - JSON-RPC client for the Aria2 daemon
//! - `bridge` - Intent translation + in-memory job registry
//! - `tracker` - Shared progress-polling loop
//! - `bot` - Core bot functionality (with Throttle for API rate limiting)
//! - `plugins` - Command handlers (extensible)
//! - `utils` - Utility functions

pub mod aria2;
pub mod bot;
pub mod bridge;
pub mod config;
pub mod error;
pub mod plugins;
pub mod tracker;
pub mod utils;
