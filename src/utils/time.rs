//! Time parsing and formatting utilities for dlna-explorer
//!
//! This module provides functions for parsing the time strings used by DLNA
//! devices and DIDL-Lite documents, and for rendering positions back into them.

use std::time::Duration;

/// Converts time string to milliseconds
///
/// Supports two formats:
/// - H+:MM:SS[.F+] (for DLNA position info and DIDL-Lite durations)
/// - HH:MM:SS,mmm (for comma separated fractions some servers emit)
///
/// # Arguments
/// * `time_str` - Time string to convert
///
/// # Returns
/// Returns time in milliseconds, or 0 if parsing fails
pub fn time_str_to_milliseconds(time_str: &str) -> u64 {
    // Try HH:MM:SS format first (DLNA format)
    if let Ok(ms) = parse_dlna_time_format(time_str) {
        return ms;
    }

    // Try HH:MM:SS,mmm format
    if let Ok(ms) = parse_comma_time_format(time_str) {
        return ms;
    }

    // Return 0 if both formats fail
    0
}

/// Parses DLNA time format (HH:MM:SS or HH:MM:SS.mmm)
fn parse_dlna_time_format(time_str: &str) -> Result<u64, ()> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 3 {
        return Err(());
    }

    let hours: u64 = parts[0].parse().map_err(|_| ())?;
    let minutes: u64 = parts[1].parse().map_err(|_| ())?;

    // Handle seconds with optional decimal part
    let seconds: f64 = parts[2].parse().map_err(|_| ())?;

    Ok((((hours as f64) * 3600.0 + (minutes as f64) * 60.0 + seconds) * 1000.0) as u64)
}

/// Parses comma separated time format (HH:MM:SS,mmm)
fn parse_comma_time_format(time_str: &str) -> Result<u64, ()> {
    let parts: Vec<&str> = time_str.split(&[',', ':']).collect();
    if parts.len() != 4 {
        return Err(());
    }

    let hours: u64 = parts[0].parse().map_err(|_| ())?;
    let minutes: u64 = parts[1].parse().map_err(|_| ())?;
    let seconds: u64 = parts[2].parse().map_err(|_| ())?;
    let milliseconds: u64 = parts[3].parse().map_err(|_| ())?;

    Ok(hours * 3600000 + minutes * 60000 + seconds * 1000 + milliseconds)
}

/// Formats a position as `H:MM:SS`, the way progress is displayed
pub fn format_time_text(position: Duration) -> String {
    let total = position.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// Formats a position as the `HH:MM:SS` target of an AVTransport `Seek`
pub fn format_dlna_time(position: Duration) -> String {
    let total = position.as_secs();
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_str_to_milliseconds_dlna_format() {
        assert_eq!(time_str_to_milliseconds("01:30:45"), 5445000);
        assert_eq!(time_str_to_milliseconds("00:00:30"), 30000);
        assert_eq!(time_str_to_milliseconds("02:15:30.5"), 8130500);
    }

    #[test]
    fn test_time_str_to_milliseconds_comma_format() {
        assert_eq!(time_str_to_milliseconds("01:30:45,123"), 5445123);
        assert_eq!(time_str_to_milliseconds("00:00:30,000"), 30000);
    }

    #[test]
    fn test_time_str_to_milliseconds_invalid() {
        assert_eq!(time_str_to_milliseconds("invalid"), 0);
        assert_eq!(time_str_to_milliseconds("1:2"), 0);
        assert_eq!(time_str_to_milliseconds("NOT_IMPLEMENTED"), 0);
    }

    #[test]
    fn test_format_time_text() {
        assert_eq!(format_time_text(Duration::ZERO), "0:00:00");
        assert_eq!(format_time_text(Duration::from_millis(3_725_999)), "1:02:05");
    }

    #[test]
    fn test_format_dlna_time() {
        assert_eq!(format_dlna_time(Duration::from_secs(65)), "00:01:05");
        assert_eq!(
            time_str_to_milliseconds(&format_dlna_time(Duration::from_secs(4000))),
            4_000_000
        );
    }
}
