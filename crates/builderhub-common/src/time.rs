use chrono::{DateTime, Utc};

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Current wall-clock time in epoch milliseconds, the unit every
/// timestamp in the data model uses.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Human-friendly age of a timestamp relative to `now` (both epoch ms).
pub fn format_relative(timestamp: i64, now: i64) -> String {
    let hours = (now - timestamp).div_euclid(HOUR_MS);
    if hours < 1 {
        "Just now".to_string()
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if hours < 48 {
        "Yesterday".to_string()
    } else {
        DateTime::<Utc>::from_timestamp_millis(timestamp)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| timestamp.to_string())
    }
}
