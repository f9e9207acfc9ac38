//! Inline keyboard callback handlers.
//!
//! Buttons on the welcome message: status overview, pause all, resume all,
//! cancel all. The pressed button's message is edited in place.

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::error;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::error::BridgeError;
use crate::plugins::status::summary_line;

/// Longest listing shown in the status overview.
const STATUS_LIMIT: usize = 10;

/// Handle a callback query from the control keyboard.
pub async fn handle_callback(
    bot: ThrottledBot,
    q: CallbackQuery,
    state: AppState,
) -> anyhow::Result<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    let text = match q.data.as_deref() {
        Some("status") => status_overview(&state),
        Some("pause") => match state.bridge.pause_all().await {
            Ok(()) => "⏸ All downloads paused".to_string(),
            Err(err) => describe(err),
        },
        Some("resume") => match state.bridge.resume_all().await {
            Ok(()) => "▶️ Downloads resumed".to_string(),
            Err(err) => describe(err),
        },
        Some("cancel") => match state.bridge.cancel_all().await {
            Ok(count) => format!("⏹ Cancelled {} download(s)", count),
            Err(err) => describe(err),
        },
        _ => return Ok(()),
    };

    bot.edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(())
}

/// Overview of every non-terminal job the bot tracks, across chats.
fn status_overview(state: &AppState) -> String {
    let mut jobs = state.bridge.registry().active_jobs();
    if jobs.is_empty() {
        return "ℹ️ No active downloads".to_string();
    }
    jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let total = jobs.len();
    let mut lines = vec![format!("📊 <b>Current downloads ({}):</b>\n", total)];
    for (idx, job) in jobs.iter().take(STATUS_LIMIT).enumerate() {
        lines.push(summary_line(idx + 1, job));
    }
    if total > STATUS_LIMIT {
        lines.push(format!("… and {} more", total - STATUS_LIMIT));
    }
    lines.join("\n")
}

fn describe(err: BridgeError) -> String {
    if let BridgeError::Internal(detail) = &err {
        error!("callback action failed: {:#}", detail);
    }
    err.user_message()
}
