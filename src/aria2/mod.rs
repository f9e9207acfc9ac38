//! Aria2 JSON-RPC client.
//!
//! Thin typed wrapper over the daemon's HTTP JSON-RPC interface. The bot
//! delegates all download execution to Aria2; this module only speaks the
//! wire protocol.

mod client;
pub mod protocol;

pub use client::{Aria2Client, Aria2Error};
pub use protocol::{GlobalStat, TaskState, TaskStatus};
