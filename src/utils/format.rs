//! Formatting helpers for progress replies.
//!
//! Byte sizes, speeds, ETA estimates and the text progress bar shown in
//! download status messages.

/// Width of the text progress bar in cells.
const BAR_WIDTH: usize = 10;

/// Format a byte count as a human readable size ("1.5 MB").
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} PB", size)
}

/// Format a download speed ("1.5 MB/s").
pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_size(bytes_per_sec))
}

/// Estimate remaining time from byte counters and current speed.
///
/// Returns "N/A" when the speed is zero or the download is already done.
pub fn format_eta(completed: u64, total: u64, speed: u64) -> String {
    if speed == 0 || total <= completed {
        return "N/A".to_string();
    }

    let remaining_secs = (total - completed) / speed;
    if remaining_secs < 60 {
        format!("{}s", remaining_secs)
    } else if remaining_secs < 3600 {
        format!("{}m {}s", remaining_secs / 60, remaining_secs % 60)
    } else {
        format!("{}h {}m", remaining_secs / 3600, (remaining_secs % 3600) / 60)
    }
}

/// Render a text progress bar for a fraction in `0.0..=1.0`.
pub fn progress_bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
    let mut bar = String::with_capacity(BAR_WIDTH * 3);
    for _ in 0..filled {
        bar.push('█');
    }
    for _ in filled..BAR_WIDTH {
        bar.push('░');
    }
    bar
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(2048), "2.0 KB/s");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(0, 100, 0), "N/A");
        assert_eq!(format_eta(100, 100, 10), "N/A");
        assert_eq!(format_eta(0, 100, 10), "10s");
        assert_eq!(format_eta(0, 7200, 60), "2m 0s");
        assert_eq!(format_eta(0, 7200, 1), "2h 0m");
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0), "░░░░░░░░░░");
        assert_eq!(progress_bar(0.5), "█████░░░░░");
        assert_eq!(progress_bar(1.0), "██████████");
        // Out-of-range fractions are clamped
        assert_eq!(progress_bar(1.7), "██████████");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a<b>&c"), "a&lt;b&gt;&amp;c");
    }
}
