//! /help command plugin.

use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::bot::dispatcher::{AppState, ThrottledBot};

/// Handle the /help command.
pub async fn help_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let help_text = format!(
        "🤖 <b>Ariadne Help</b>\n\n\
        <b>Supported sources:</b>\n\
        • HTTP/HTTPS/FTP URLs\n\
        • Magnet links\n\
        • .torrent files (send as document)\n\n\
        <b>Commands:</b>\n\
        <code>/add &lt;uri&gt;</code> - Queue a download\n\
        <code>/status</code> - List this chat's downloads\n\
        <code>/status &lt;handle&gt;</code> - One download in detail\n\
        <code>/cancel &lt;handle&gt;</code> - Cancel a download\n\
        <code>/stats</code> - Daemon statistics\n\n\
        Plain messages containing a URL or magnet link are queued directly.\n\
        Each download gets a handle like <code>dl-7</code>; progress messages\n\
        update in place until the download finishes.\n\n\
        Per-chat limit: {} concurrent downloads.",
        state.max_concurrent_downloads
    );

    bot.send_message(msg.chat.id, help_text)
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(())
}
