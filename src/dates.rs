use chrono::{DateTime, NaiveDate, NaiveDateTime, ParseResult, Timelike};

/// Converts a date string (must be "%Y-%m-%d") into an i64 Unix timestamp in
/// seconds, taken as midnight UTC.
pub fn date_string_to_timestamp(date_str: &str) -> ParseResult<i64> {
    let formatter = "%Y-%m-%d";
    match NaiveDate::parse_from_str(date_str, formatter) {
        Ok(d) => Ok(d.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp()),
        Err(e) => Err(e),
    }
}

/// Converts a date/time string with automatic format detection into an i64
/// Unix timestamp.
///
/// Tries multiple common formats and returns both the timestamp and the
/// detected format, so subsequent rows of the same file can be parsed with
/// the fixed format. Daily formats are tried first (most common), then
/// sub-daily formats (ISO first).
pub fn date_string_to_timestamp_flexible(date_str: &str) -> Result<(i64, &'static str), String> {
    // List of formats to try, in order of preference
    let formats = vec![
        // Daily formats (no time component)
        "%Y-%m-%d",                // 2020-01-15 (ISO, current default)
        "%d/%m/%Y",                // 15/01/2020 (European)
        "%Y/%m/%d",                // 2020/01/15
        "%d-%m-%Y",                // 15-01-2020

        // Sub-daily formats (with time component)
        "%Y-%m-%dT%H:%M:%S",       // 2020-01-15T14:30:00 (ISO 8601)
        "%Y-%m-%d %H:%M:%S",       // 2020-01-15 14:30:00 (space separator)
        "%Y-%m-%d %H:%M",          // 2020-01-15 14:30 (no seconds)
        "%d/%m/%Y %H:%M:%S",       // 15/01/2020 14:30:00
        "%d/%m/%Y %H:%M",          // 15/01/2020 14:30
    ];

    for format in formats {
        if let Ok(dt) = try_parse_datetime(date_str, format) {
            return Ok((dt.and_utc().timestamp(), format));
        }
    }

    Err(format!("Could not parse date '{}' with any known format", date_str))
}

/// Converts a date/time string to a timestamp using a known format string.
pub fn date_string_to_timestamp_with_format(date_str: &str, format: &str) -> Result<i64, String> {
    try_parse_datetime(date_str, format)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|e| format!("Failed to parse '{}' with format '{}': {}", date_str, format, e))
}

/// Helper function to try parsing a date/time string with a specific format.
///
/// Handles both date-only formats (sets time to midnight) and date+time
/// formats.
fn try_parse_datetime(date_str: &str, format: &str) -> ParseResult<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
        return Ok(dt);
    }

    if let Ok(date) = NaiveDate::parse_from_str(date_str, format) {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap());
    }

    NaiveDateTime::parse_from_str(date_str, format)
}

/// Converts a timestamp to a date/datetime string, automatically choosing
/// the format.
///
/// # Returns
///
/// * `YYYY-MM-DD` if the time is exactly midnight (00:00:00)
/// * `YYYY-MM-DDTHH:MM:SS` if there is any partial-day information
pub fn timestamp_to_auto_string(value: i64) -> String {
    match DateTime::from_timestamp(value, 0) {
        Some(dt) => {
            if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 {
                dt.format("%Y-%m-%d").to_string()
            } else {
                dt.format("%Y-%m-%dT%H:%M:%S").to_string()
            }
        }
        None => format!("INVALID_TIMESTAMP_{}", value),
    }
}
