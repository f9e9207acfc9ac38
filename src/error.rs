//! User-facing error taxonomy.
//!
//! Every failure a command handler can hit maps into one of these variants.
//! `user_message` is what the chat sees; anything more detailed goes to the
//! logs.

use thiserror::Error;

use crate::aria2::Aria2Error;
use crate::utils::html_escape;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Bad command, URI or document. Reported to the user, never retried,
    /// never reaches the RPC bridge.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Aria2 could not be reached after the bounded retry budget.
    #[error("download backend unavailable: {0}")]
    RpcUnavailable(#[source] Aria2Error),

    /// Unknown download handle.
    #[error("unknown download handle: {0}")]
    NotFound(String),

    /// Unexpected state. Logged; the user gets a generic message.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BridgeError {
    /// Text shown in the chat reply.
    pub fn user_message(&self) -> String {
        match self {
            BridgeError::InvalidInput(reason) => format!("❌ {}", reason),
            BridgeError::RpcUnavailable(_) => {
                "❌ The download service is unreachable right now. Try again in a minute.".to_string()
            }
            BridgeError::NotFound(handle) => {
                format!("❌ No download with handle <code>{}</code>.", html_escape(handle))
            }
            BridgeError::Internal(_) => "❌ Something went wrong. It has been logged.".to_string(),
        }
    }
}
