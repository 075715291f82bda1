use chrono::{DateTime, Utc};

pub fn now_unix_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Format unix milliseconds as a `YYYY-MM-DD` UTC date (empty when out of range).
pub fn format_date(unix_ms: u64) -> String {
    i64::try_from(unix_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Short preview of a melody's notes: the first `max` labels, then `+N more`.
pub fn preview_keys<'a>(keys: impl ExactSizeIterator<Item = &'a str>, max: usize) -> String {
    let total = keys.len();
    let more = format!("+{} more", total.saturating_sub(max));
    let mut out: Vec<&str> = keys.take(max).collect();

    if total > max {
        out.push(&more);
    }

    out.join(" ")
}
