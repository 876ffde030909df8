//! UTC date parsing and formatting.

use chrono::{DateTime, NaiveDate, Utc};
use hotspot_types::Timestamp;

use crate::UtilsError;

/// Parse `YYYY-MM-DD` as midnight UTC.
pub fn parse_date(s: &str) -> Result<Timestamp, UtilsError> {
    let invalid = || UtilsError::InvalidDate(s.to_string());

    let secs = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| invalid())?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(invalid)?
        .and_utc()
        .timestamp();
    // Nothing is cached before the epoch.
    let secs = u64::try_from(secs).map_err(|_| invalid())?;
    Ok(Timestamp::new(secs))
}

/// Format as `YYYY-MM-DD HH:MM:SS` UTC. Times chrono cannot represent are
/// shown as raw seconds.
pub fn format_timestamp(ts: Timestamp) -> String {
    i64::try_from(ts.as_secs())
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.as_secs().to_string())
}
