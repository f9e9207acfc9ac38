//! /status and /stats command plugins.

use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};
use tracing::error;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::bridge::DownloadJob;
use crate::error::BridgeError;
use crate::utils::{format_speed, html_escape, truncate_name};

/// Handle the /status command. With a handle argument, shows one download
/// in detail (refreshed from the daemon); without, lists this chat's jobs
/// from the registry.
pub async fn status_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    handle: String,
) -> anyhow::Result<()> {
    let handle = handle.trim();

    let text = if handle.is_empty() {
        chat_listing(&state, msg.chat.id)
    } else {
        match state.bridge.poll(handle).await {
            Ok(job) => job.status_card(),
            Err(err) => {
                if let BridgeError::Internal(detail) = &err {
                    error!("status poll failed: {:#}", detail);
                }
                err.user_message()
            }
        }
    };

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;

    Ok(())
}

/// Handle the /stats command: daemon-wide counters plus the bot's own
/// tracked-job count.
pub async fn stats_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let text = match state.bridge.global_stat().await {
        Ok(stat) => format!(
            "📈 <b>Statistics</b>\n\n\
             Active: {}\n\
             Waiting: {}\n\
             Stopped: {}\n\
             DL speed: {}\n\
             UL speed: {}\n\n\
             Tracked by the bot: {}",
            stat.num_active(),
            stat.num_waiting(),
            stat.num_stopped(),
            format_speed(stat.download_speed()),
            format_speed(stat.upload_speed()),
            state.bridge.registry().len(),
        ),
        Err(err) => {
            if let BridgeError::Internal(detail) = &err {
                error!("global stat failed: {:#}", detail);
            }
            err.user_message()
        }
    };

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;

    Ok(())
}

/// Render the per-chat job list from the registry (no RPC round-trip).
fn chat_listing(state: &AppState, chat_id: ChatId) -> String {
    let jobs = state.bridge.registry().jobs_for_chat(chat_id);
    if jobs.is_empty() {
        return "ℹ️ No active downloads".to_string();
    }

    let mut lines = vec![format!("📊 <b>Your downloads ({}):</b>\n", jobs.len())];
    for (idx, job) in jobs.iter().enumerate() {
        lines.push(summary_line(idx + 1, job));
    }
    lines.join("\n")
}

/// One list entry: name, handle, progress and speed.
pub fn summary_line(idx: usize, job: &DownloadJob) -> String {
    format!(
        "{}. <b>{}</b> (<code>{}</code>)\n   {:.1}% | {} | {}",
        idx,
        html_escape(&truncate_name(&job.name, 30)),
        job.handle,
        job.progress * 100.0,
        format_speed(job.speed),
        job.status.label(),
    )
}
