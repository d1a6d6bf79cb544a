//! Table formatting helpers for CLI output.

use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table};

const SHORT_HEX: usize = 12;

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a timestamp as a relative "ago" string.
pub fn format_ago(dt: &DateTime<Utc>) -> String {
    format_ago_from(Utc::now(), dt)
}

fn format_ago_from(now: DateTime<Utc>, dt: &DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(*dt);

    let secs = duration.num_seconds();
    if secs < 0 {
        return "just now".to_string();
    }
    if secs < 60 {
        return format!("{secs} seconds ago");
    }

    let mins = duration.num_minutes();
    if mins < 60 {
        return format!("{mins} minutes ago");
    }

    let hours = duration.num_hours();
    if hours < 24 {
        return format!("{hours} hours ago");
    }

    let days = duration.num_days();
    if days < 30 {
        return format!("{days} days ago");
    }

    let months = days / 30;
    if months < 12 {
        return format!("{months} months ago");
    }

    format!("{} years ago", days / 365)
}

/// Shorten `name@sha256:<hex>` or `sha256:<hex>` to `sha256:<12 hex>`.
/// Empty digests show as `<none>`.
pub fn short_digest(digest: &str) -> String {
    let digest = digest.rsplit_once('@').map_or(digest, |(_, d)| d);
    if digest.is_empty() {
        return "<none>".to_string();
    }
    match digest.split_once(':') {
        Some((algorithm, hex)) => {
            format!("{}:{}", algorithm, hex.chars().take(SHORT_HEX).collect::<String>())
        }
        None => digest.chars().take(SHORT_HEX).collect(),
    }
}
