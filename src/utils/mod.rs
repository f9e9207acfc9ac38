//! Utility functions.
//!
//! Collection of helper functions used across the bot.

pub mod format;
pub mod uri;

pub use format::{format_eta, format_size, format_speed, html_escape, progress_bar};
pub use uri::{parse_source, SourceUri};

/// Truncate a display name for list views.
pub fn truncate_name(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let truncated: String = name.chars().take(max).collect();
    format!("{}...", truncated)
}
