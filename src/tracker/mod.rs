//! Shared progress-tracking loop.
//!
//! One tokio task polls every active job on a fixed interval and edits each
//! job's progress message in its owning chat. Scheduling is explicit: a
//! timer drives the periodic ticks and an mpsc channel carries wake-ups for
//! fresh submissions and the shutdown signal, so there is no per-job task
//! and no implicit callback chain.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::bot::dispatcher::ThrottledBot;
use crate::bridge::{DownloadJob, RpcBridge};
use crate::error::BridgeError;

enum TrackerCommand {
    /// Poll one handle now instead of waiting for the next tick.
    Wake(String),
    Shutdown,
}

/// Progress message state per handle, to skip no-op edits.
struct ProgressMessage {
    message_id: MessageId,
    last_text: String,
}

/// Cloneable wake-up sender handed to command handlers.
#[derive(Clone)]
pub struct TrackerWaker {
    tx: mpsc::Sender<TrackerCommand>,
}

impl TrackerWaker {
    /// Ask the tracker to poll `handle` promptly. Best-effort: a full queue
    /// just means the next tick picks it up.
    pub fn wake(&self, handle: &str) {
        let _ = self.tx.try_send(TrackerCommand::Wake(handle.to_string()));
    }
}

/// Owning handle for the tracker task.
pub struct Tracker {
    tx: mpsc::Sender<TrackerCommand>,
    task: JoinHandle<()>,
}

impl Tracker {
    pub fn waker(&self) -> TrackerWaker {
        TrackerWaker {
            tx: self.tx.clone(),
        }
    }

    /// Stop the loop and wait for it to drain.
    pub async fn shutdown(self) {
        let _ = self.tx.send(TrackerCommand::Shutdown).await;
        if let Err(err) = self.task.await {
            warn!("tracker task join failed: {}", err);
        }
    }
}

/// Spawn the tracker loop.
pub fn spawn(
    bot: ThrottledBot,
    bridge: Arc<RpcBridge>,
    poll_interval: Duration,
    retention: Duration,
) -> Tracker {
    let (tx, mut rx) = mpsc::channel(64);
    let messages: Arc<DashMap<String, ProgressMessage>> = Arc::new(DashMap::new());

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = poll_interval.as_secs(), "progress tracker started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tick(&bot, &bridge, &messages, retention).await;
                }
                cmd = rx.recv() => match cmd {
                    Some(TrackerCommand::Wake(handle)) => {
                        poll_one(&bot, &bridge, &messages, &handle).await;
                    }
                    Some(TrackerCommand::Shutdown) | None => {
                        info!("progress tracker stopping");
                        break;
                    }
                }
            }
        }
    });

    Tracker { tx, task }
}

/// One periodic tick: poll every non-terminal job concurrently, then evict
/// jobs past their retention window.
async fn tick(
    bot: &ThrottledBot,
    bridge: &Arc<RpcBridge>,
    messages: &Arc<DashMap<String, ProgressMessage>>,
    retention: Duration,
) {
    let jobs = bridge.registry().active_jobs();
    if !jobs.is_empty() {
        debug!(count = jobs.len(), "poll tick");
        futures::future::join_all(
            jobs.iter()
                .map(|job| poll_one(bot, bridge, messages, &job.handle)),
        )
        .await;
    }

    for evicted in bridge.registry().evict_finished(retention) {
        messages.remove(&evicted.handle);
        debug!(handle = %evicted.handle, "evicted finished job");
    }
}

/// Poll one job and refresh its progress message.
async fn poll_one(
    bot: &ThrottledBot,
    bridge: &Arc<RpcBridge>,
    messages: &Arc<DashMap<String, ProgressMessage>>,
    handle: &str,
) {
    let job = match bridge.poll(handle).await {
        Ok(job) => job,
        Err(BridgeError::NotFound(_)) => {
            messages.remove(handle);
            return;
        }
        Err(err) => {
            warn!(handle, "poll failed: {}", err);
            return;
        }
    };

    // Adopted jobs have no chat to notify; they are still polled so their
    // terminal state is recorded and eviction works.
    let Some(chat) = job.chat else { return };

    let text = job.status_card();
    render(bot, messages, chat, &job, text).await;
}

/// Send or edit the progress message, skipping unchanged text.
async fn render(
    bot: &ThrottledBot,
    messages: &Arc<DashMap<String, ProgressMessage>>,
    chat: ChatId,
    job: &DownloadJob,
    text: String,
) {
    if let Some(mut entry) = messages.get_mut(&job.handle) {
        if entry.last_text == text {
            return;
        }
        let message_id = entry.message_id;
        entry.last_text = text.clone();
        drop(entry);

        if let Err(err) = bot
            .edit_message_text(chat, message_id, text)
            .parse_mode(ParseMode::Html)
            .await
        {
            // "message is not modified" races are harmless; anything else
            // is worth a log line.
            warn!(handle = %job.handle, "progress edit failed: {}", err);
        }
        return;
    }

    match bot
        .send_message(chat, text.clone())
        .parse_mode(ParseMode::Html)
        .await
    {
        Ok(sent) => {
            messages.insert(
                job.handle.clone(),
                ProgressMessage {
                    message_id: sent.id,
                    last_text: text,
                },
            );
        }
        Err(err) => {
            error!(handle = %job.handle, "failed to send progress message: {}", err);
        }
    }
}
