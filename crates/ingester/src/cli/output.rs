//! Output formatting utilities for CLI commands
//!
//! Provides consistent formatting for:
//! - Tables with column alignment
//! - File sizes (human-readable, and the "mb" figure shown before a copy)
//! - Timestamps (relative and absolute)
//! - The byte progress bar

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, SystemTime};

/// Format a file size in human-readable form
///
/// Examples:
/// - 500 -> "500 B"
/// - 1024 -> "1.0 KB"
/// - 1536000 -> "1.5 MB"
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Batch size in mebibytes: three significant digits below 1000, rounded
/// to a whole number above.
///
/// Examples:
/// - 15 MiB -> "15.0"
/// - 1.5 KiB -> "0.00146"
/// - 2048 MiB -> "2048"
pub fn format_mb(bytes: u64) -> String {
    let mb = bytes as f64 / 1024.0 / 1024.0;
    if mb >= 1000.0 {
        return format!("{}", mb.round() as u64);
    }
    if mb == 0.0 {
        return "0.00".to_string();
    }

    let decimals_for = |value: f64| {
        let int_digits = value.abs().log10().floor() as i32 + 1;
        (3 - int_digits).max(0) as usize
    };
    let decimals = decimals_for(mb);
    let formatted = format!("{:.*}", decimals, mb);
    // 9.996 rounds up to 10.00; one digit too many
    match formatted.parse::<f64>() {
        Ok(rounded) if decimals > 0 && decimals_for(rounded) < decimals => {
            format!("{:.*}", decimals - 1, mb)
        }
        _ => formatted,
    }
}

/// Format a system time as a human-readable relative time
///
/// Examples:
/// - "2 seconds ago"
/// - "5 minutes ago"
/// - "2024-12-15 14:30" (if older than a week)
pub fn format_time(time: SystemTime) -> String {
    match SystemTime::now().duration_since(time) {
        Ok(duration) => format_duration_ago(duration),
        Err(_) => "just now".to_string(),
    }
}

fn format_duration_ago(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{} second{} ago", secs, if secs == 1 { "" } else { "s" })
    } else if secs < 3600 {
        let mins = secs / 60;
        format!("{} minute{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if secs < 86400 {
        let hours = secs / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if secs < 604800 {
        let days = secs / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_absolute_time(duration)
    }
}

fn format_absolute_time(duration_ago: Duration) -> String {
    use chrono::Local;

    let now = Local::now();
    let time = now - chrono::Duration::seconds(duration_ago.as_secs() as i64);
    time.format("%Y-%m-%d %H:%M").to_string()
}

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

/// Byte progress bar for the copy stage
pub fn copy_progress_bar(total_bytes: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    let style = ProgressStyle::with_template(
        "[{bar:35.green}] {percent}% {bytes}/{total_bytes} {eta}",
    )
    .map(|s| s.progress_chars("== "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
