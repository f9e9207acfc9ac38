//! Message dispatcher setup.
//!
//! Builds the dispatcher with the command, plain-URI, document and callback
//! handlers, and the shared application state they receive.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

use crate::bridge::RpcBridge;
use crate::plugins;
use crate::tracker::TrackerWaker;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Bridge to the Aria2 daemon and the job registry.
    pub bridge: Arc<RpcBridge>,

    /// Wake-up line to the progress tracker.
    pub tracker: TrackerWaker,

    /// Per-chat cap on concurrently active downloads.
    pub max_concurrent_downloads: usize,

    /// Chats allowed to use the bot. Empty means open to everyone.
    pub allowed_chat_ids: Vec<i64>,
}

impl AppState {
    pub fn new(
        bridge: Arc<RpcBridge>,
        tracker: TrackerWaker,
        max_concurrent_downloads: usize,
        allowed_chat_ids: Vec<i64>,
    ) -> Self {
        Self {
            bridge,
            tracker,
            max_concurrent_downloads,
            allowed_chat_ids,
        }
    }

    /// Check the chat allowlist. An empty list admits everyone.
    pub fn chat_allowed(&self, chat_id: ChatId) -> bool {
        self.allowed_chat_ids.is_empty() || self.allowed_chat_ids.contains(&chat_id.0)
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    state: AppState,
) -> Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    // Message handlers: commands first, then torrent documents, then plain
    // text treated as a download URI. Messages from chats outside the
    // allowlist are dropped before any handler runs.
    let message_handler = Update::filter_message().branch(
        dptree::filter(|msg: Message, state: AppState| state.chat_allowed(msg.chat.id))
            .branch(plugins::command_handler())
            .branch(plugins::document_handler())
            .branch(plugins::uri_handler()),
    );

    let callback_handler = Update::filter_callback_query().branch(
        dptree::filter(|q: CallbackQuery, state: AppState| {
            q.message
                .as_ref()
                .map(|m| state.chat_allowed(m.chat().id))
                .unwrap_or(false)
        })
        .branch(plugins::callback_handler()),
    );

    dptree::entry()
        .branch(message_handler)
        .branch(callback_handler)
}
