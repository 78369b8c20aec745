use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use chrono::DateTime;
use chrono::Datelike;
use chrono::Utc;

/// Layout of configuration version stamps, e.g. `2024-05-01 09:30:12.004211`
pub(crate) const VERSION_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// return millisecond
pub(crate) fn get_now_as_u128() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// UTC timestamp used as a configuration version
pub(crate) fn version_stamp(now: DateTime<Utc>) -> String {
    now.format(VERSION_FORMAT).to_string()
}

/// `(YYYY, MM)` path components used to bucket backups
pub(crate) fn year_month(now: DateTime<Utc>) -> (String, String) {
    (now.year().to_string(), format!("{:02}", now.month()))
}
