//! /start command plugin.
//!
//! Sends the welcome message with the inline control keyboard.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};

use crate::bot::dispatcher::{AppState, ThrottledBot};

/// Inline keyboard shown under the welcome message.
pub fn control_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📊 Status", "status")],
        vec![
            InlineKeyboardButton::callback("⏸ Pause all", "pause"),
            InlineKeyboardButton::callback("▶️ Resume all", "resume"),
        ],
        vec![InlineKeyboardButton::callback("⏹ Cancel all", "cancel")],
    ])
}

/// Handle the /start command.
pub async fn start_command(
    bot: ThrottledBot,
    msg: Message,
    _state: AppState,
) -> anyhow::Result<()> {
    let welcome_text = "🤖 <b>Ariadne</b>\n\n\
        📥 Send me:\n\
        • HTTP/HTTPS/FTP URLs\n\
        • Magnet links\n\
        • .torrent files\n\n\
        <b>Commands:</b>\n\
        <code>/add &lt;uri&gt;</code> - Queue a download\n\
        <code>/status [handle]</code> - Show downloads\n\
        <code>/cancel &lt;handle&gt;</code> - Cancel a download\n\
        <code>/stats</code> - Daemon statistics\n\
        <code>/help</code> - Detailed help";

    bot.send_message(msg.chat.id, welcome_text)
        .parse_mode(ParseMode::Html)
        .reply_markup(control_keyboard())
        .await?;

    Ok(())
}
