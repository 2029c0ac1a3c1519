//! Shared helpers for the command implementations

use jobwatch::error::{JobwatchError, Result};

/// Shortest poll interval accepted from the command line
pub const MIN_INTERVAL_SECS: u64 = 10;

/// Parse "30s", "5m", "2h", "1d" or plain seconds
pub fn parse_duration(s: &str) -> Option<u64> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    if let Ok(secs) = s.parse::<u64>() {
        return Some(secs);
    }

    let (num_str, unit) = if let Some(n) = s.strip_suffix('s') {
        (n, 1u64)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60u64)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600u64)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 86400u64)
    } else {
        return None;
    };

    num_str.parse::<u64>().ok().and_then(|n| n.checked_mul(unit))
}

/// Parse a poll interval, enforcing [`MIN_INTERVAL_SECS`]
pub fn parse_interval_str(s: &str) -> Result<u64> {
    let secs = parse_duration(s).ok_or_else(|| {
        JobwatchError::ConfigError(format!(
            "Invalid interval '{}'. Use format like 30s, 5m, 1h", s
        ))
    })?;

    if secs < MIN_INTERVAL_SECS {
        return Err(JobwatchError::ConfigError(format!(
            "Interval {}s is too short. Minimum is {}s.",
            secs, MIN_INTERVAL_SECS
        )));
    }

    Ok(secs)
}

/// Format seconds as a short interval ("30s", "5m", "2h", "1d")
pub fn format_interval(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

/// Truncate to `max_len` characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        chars[..max_len].iter().collect()
    } else {
        format!("{}...", chars[..max_len - 3].iter().collect::<String>())
    }
}

/// Validate an HH:MM time of day
pub fn validate_hhmm(label: &str, value: &str) -> Result<()> {
    chrono::NaiveTime::parse_from_str(value, "%H:%M")
        .map(|_| ())
        .map_err(|_| JobwatchError::ConfigError(format!(
            "Invalid {} time '{}'. Use HH:MM format (e.g., 22:00)", label, value
        )))
}
