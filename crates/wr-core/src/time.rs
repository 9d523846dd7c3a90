//! Time utilities for wa-relay
//!
//! Timestamps that end up in file names and wire payloads.

use chrono::{DateTime, Local, TimeZone, Utc};

/// Format used in pairing artifact names; sorts lexically by time.
pub const ARTIFACT_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Render a timestamp as `YYYYMMDD-HHMMSS`.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use wr_core::time::artifact_stamp;
///
/// let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
/// assert_eq!(artifact_stamp(&at), "20240309-070501");
/// ```
pub fn artifact_stamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(ARTIFACT_STAMP_FORMAT).to_string()
}

/// Current local time as an artifact stamp
pub fn local_artifact_stamp() -> String {
    artifact_stamp(&Local::now())
}

/// Whole seconds elapsed since `since`; 0 if `since` is in the future
pub fn elapsed_secs(since: DateTime<Utc>) -> u64 {
    (Utc::now() - since).num_seconds().max(0) as u64
}
