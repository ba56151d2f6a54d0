//! Track length formatting for catalog progress attributes
//!
//! Lengths under one hour render as `m:ss`, longer ones as `h:mm:ss`.
//! Fractional seconds are truncated.

use std::time::Duration;

const SECONDS_PER_HOUR: u64 = 3600;

/// Format a track length the way catalog entries store it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use nrs_common::human_time::format_track_length;
///
/// assert_eq!(format_track_length(Duration::from_secs(83)), "1:23");
/// assert_eq!(format_track_length(Duration::from_secs(3661)), "1:01:01");
/// ```
pub fn format_track_length(length: Duration) -> String {
    let total = length.as_secs();
    let hours = total / SECONDS_PER_HOUR;
    let minutes = (total % SECONDS_PER_HOUR) / 60;
    let seconds = total % 60;

    if hours == 0 {
        format!("{}:{:02}", minutes, seconds)
    } else {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Parse a `[[h:]m:]s` track length as printed by catalog databases.
///
/// Returns `None` for values such as `"Unknown"`.
pub fn parse_track_length(text: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut parts = 0;
    for part in text.trim().split(':') {
        let value: u64 = part.trim().parse().ok()?;
        total = total.checked_mul(60)?.checked_add(value)?;
        parts += 1;
    }
    if parts == 0 || parts > 3 {
        return None;
    }
    Some(Duration::from_secs(total))
}
