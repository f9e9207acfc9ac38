//! Plugin system for command handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding the handler to `command_handler()`

pub mod callbacks;
pub mod download;
pub mod help;
pub mod start;
pub mod status;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Show the welcome menu")]
    Start,

    #[command(description = "Show detailed help")]
    Help,

    #[command(description = "Queue a download: /add <uri>")]
    Add(String),

    #[command(description = "Show downloads: /status [handle]")]
    Status(String),

    #[command(description = "Cancel a download: /cancel <handle>")]
    Cancel(String),

    #[command(description = "Show daemon statistics")]
    Stats,
}

/// Build the combined command handler.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(start::start_command))
        .branch(case![Command::Help].endpoint(help::help_command))
        .branch(case![Command::Add(uri)].endpoint(download::add_command))
        .branch(case![Command::Status(handle)].endpoint(status::status_command))
        .branch(case![Command::Cancel(handle)].endpoint(download::cancel_command))
        .branch(case![Command::Stats].endpoint(status::stats_command))
}

/// Build the handler for plain text messages: anything that is not a
/// command is treated as a download URI.
pub fn uri_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| {
        msg.text()
            .map(|t| !t.trim().is_empty() && !t.starts_with('/'))
            .unwrap_or(false)
    })
    .endpoint(download::plain_uri_message)
}

/// Build the handler for `.torrent` document uploads.
pub fn document_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| msg.document().is_some())
        .endpoint(download::torrent_document)
}

/// Build the callback query handler for the inline control keyboard.
pub fn callback_handler() -> UpdateHandler<anyhow::Error> {
    dptree::entry().endpoint(callbacks::handle_callback)
}
