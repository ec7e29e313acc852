//! Attendance records returned by the service and the late check-in rule.
//!
//! The admin user table and the per-user report both flag late check-ins;
//! they must agree, so both go through [`is_late_check_in`].

use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Check-ins after 09:10:00 local time are late.
const LATE_CUTOFF_SECS: u32 = 9 * 3600 + 10 * 60;

/// Naive layouts the service has been seen to emit (no offset, local time).
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized timestamp: {0}")]
pub struct TimestampError(pub String);

/// Parse a service timestamp into local wall-clock time.
///
/// Offset-qualified (RFC 3339) values are converted to the local zone;
/// naive values are taken as already local.
pub fn parse_event_time(raw: &str) -> Result<NaiveDateTime, TimestampError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Local).naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| TimestampError(raw.to_string()))
}

/// True when the wall-clock time is strictly after 09:10:00 on its own date.
pub fn is_late_check_in(local: &NaiveDateTime) -> bool {
    let time = local.time();
    let secs = time.num_seconds_from_midnight();
    secs > LATE_CUTOFF_SECS || (secs == LATE_CUTOFF_SECS && time.nanosecond() > 0)
}

/// Same rule over a raw service timestamp. Unparseable values are never late.
pub fn is_late_timestamp(raw: &str) -> bool {
    parse_event_time(raw)
        .map(|t| is_late_check_in(&t))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Checkin,
    Checkout,
}

/// One row of `/attendance/{username}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub event_type: EventType,
    pub event_time: String,
}

impl AttendanceEvent {
    /// Only check-ins can be late.
    pub fn is_late(&self) -> bool {
        self.event_type == EventType::Checkin && is_late_timestamp(&self.event_time)
    }
}

/// One row of `/getall`, also the body of `/update-user/{name}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub latest_checkin: Option<String>,
    #[serde(default)]
    pub latest_checkout: Option<String>,
}

impl UserRecord {
    pub fn latest_checkin_late(&self) -> bool {
        self.latest_checkin
            .as_deref()
            .map(is_late_timestamp)
            .unwrap_or(false)
    }
}
