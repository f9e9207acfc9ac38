//! Download command plugins: /add, /cancel, plain-URI messages and
//! `.torrent` documents.
//!
//! Validation happens here, before the RPC bridge is ever invoked: a
//! malformed URI or document is answered with an error reply and produces
//! no RPC traffic. Every command sends exactly one reply.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};
use tracing::error;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::bridge::SubmitOutcome;
use crate::error::BridgeError;
use crate::utils::{html_escape, parse_source, SourceUri};

const INVALID_SOURCE_HELP: &str = "Invalid input. Please send:\n\
    • a valid HTTP/HTTPS/FTP URL\n\
    • a valid magnet link\n\
    • a .torrent file";

fn invalid_source() -> BridgeError {
    BridgeError::InvalidInput(INVALID_SOURCE_HELP.to_string())
}

/// Handle the /add command.
pub async fn add_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    uri: String,
) -> anyhow::Result<()> {
    let uri = uri.trim();
    if uri.is_empty() {
        reply(&bot, &msg, "Usage: <code>/add &lt;uri&gt;</code>").await?;
        return Ok(());
    }

    let Some(source) = parse_source(uri) else {
        return report_bridge_error(&bot, &msg, invalid_source()).await;
    };

    queue_source(&bot, &msg, &state, &source).await
}

/// Handle a plain (non-command) text message as a download URI.
pub async fn plain_uri_message(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let text = msg.text().unwrap_or_default();

    let Some(source) = parse_source(text) else {
        return report_bridge_error(&bot, &msg, invalid_source()).await;
    };

    queue_source(&bot, &msg, &state, &source).await
}

/// Handle a document upload; only `.torrent` files are accepted.
pub async fn torrent_document(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let Some(doc) = msg.document() else {
        return Ok(());
    };

    let file_name = doc.file_name.clone().unwrap_or_default();
    if !file_name.to_lowercase().ends_with(".torrent") {
        let err = BridgeError::InvalidInput("Only .torrent files are supported".to_string());
        return report_bridge_error(&bot, &msg, err).await;
    }

    if at_capacity(&state, msg.chat.id) {
        reply(&bot, &msg, &capacity_text(&state)).await?;
        return Ok(());
    }

    // Fetch the document from Telegram and hand it to Aria2 as a base64
    // blob; the file never touches our disk.
    let blob = match fetch_document(&bot, &doc.file.id).await {
        Ok(blob) => blob,
        Err(err) => {
            error!("failed to fetch torrent document: {}", err);
            reply(&bot, &msg, "❌ Could not fetch the torrent file from Telegram").await?;
            return Ok(());
        }
    };

    match state.bridge.submit_torrent(msg.chat.id, &file_name, &blob).await {
        Ok(outcome) => {
            let text = submit_reply(&outcome);
            state.tracker.wake(&outcome.job.handle);
            reply(&bot, &msg, &text).await?;
        }
        Err(err) => {
            report_bridge_error(&bot, &msg, err).await?;
        }
    }

    Ok(())
}

/// Handle the /cancel command.
pub async fn cancel_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    handle: String,
) -> anyhow::Result<()> {
    let handle = handle.trim();
    if handle.is_empty() {
        reply(&bot, &msg, "Usage: <code>/cancel &lt;handle&gt;</code>").await?;
        return Ok(());
    }

    match state.bridge.cancel(handle).await {
        Ok(job) => {
            let text = format!(
                "⏹ Cancelled <b>{}</b> (<code>{}</code>)",
                html_escape(&job.name),
                job.handle
            );
            reply(&bot, &msg, &text).await?;
        }
        Err(err) => {
            report_bridge_error(&bot, &msg, err).await?;
        }
    }

    Ok(())
}

/// Shared submission path for /add and plain-URI messages.
async fn queue_source(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    source: &SourceUri,
) -> anyhow::Result<()> {
    if at_capacity(state, msg.chat.id) {
        reply(bot, msg, &capacity_text(state)).await?;
        return Ok(());
    }

    match state.bridge.submit(msg.chat.id, source).await {
        Ok(outcome) => {
            let text = submit_reply(&outcome);
            state.tracker.wake(&outcome.job.handle);
            reply(bot, msg, &text).await?;
        }
        Err(err) => {
            report_bridge_error(bot, msg, err).await?;
        }
    }

    Ok(())
}

fn at_capacity(state: &AppState, chat_id: ChatId) -> bool {
    state.bridge.registry().active_count_for_chat(chat_id) >= state.max_concurrent_downloads
}

fn capacity_text(state: &AppState) -> String {
    format!(
        "❌ Maximum concurrent downloads ({}) reached. \
         Wait for some downloads to complete.",
        state.max_concurrent_downloads
    )
}

fn submit_reply(outcome: &SubmitOutcome) -> String {
    if outcome.deduplicated {
        format!(
            "ℹ️ Already queued as <code>{}</code>: <b>{}</b>",
            outcome.job.handle,
            html_escape(&outcome.job.name)
        )
    } else {
        format!(
            "⏬ Download started: <b>{}</b> (handle <code>{}</code>)",
            html_escape(&outcome.job.name),
            outcome.job.handle
        )
    }
}

async fn fetch_document(bot: &ThrottledBot, file_id: &str) -> anyhow::Result<String> {
    let file = bot.get_file(file_id.to_string()).await?;
    let mut buf: Vec<u8> = Vec::new();
    bot.inner().download_file(&file.path, &mut buf).await?;
    Ok(BASE64.encode(&buf))
}

/// Reply with the user-facing text for a bridge error. The detail stays in
/// the logs; the chat only sees the taxonomy message.
async fn report_bridge_error(
    bot: &ThrottledBot,
    msg: &Message,
    err: BridgeError,
) -> anyhow::Result<()> {
    match &err {
        BridgeError::Internal(detail) => error!("bridge internal error: {:#}", detail),
        BridgeError::RpcUnavailable(detail) => error!("aria2 unreachable: {}", detail),
        BridgeError::InvalidInput(_) | BridgeError::NotFound(_) => {}
    }
    reply(bot, msg, &err.user_message()).await
}

async fn reply(bot: &ThrottledBot, msg: &Message, text: &str) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, text.to_string())
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}
