//! Human-readable durations ("500ms", "1s", "2m", "1h") used in devstack.yaml.

use std::time::Duration;

/// Parse a duration string like "500ms", "30s", "1m" or "1h".
///
/// A bare number is read as seconds. Returns `None` for anything else.
///
/// ```
/// use devstack::config::parse_duration_string;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration_string("1s"), Some(Duration::from_secs(1)));
/// assert_eq!(parse_duration_string("250ms"), Some(Duration::from_millis(250)));
/// assert_eq!(parse_duration_string("4m"), Some(Duration::from_secs(240)));
/// ```
pub fn parse_duration_string(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    if digits.is_empty() {
        return None;
    }
    let value = digits.parse::<u64>().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}
