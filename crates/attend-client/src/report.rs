//! Per-user attendance report: one row per event, in service order.

use attend_core::attendance::{parse_event_time, AttendanceEvent, EventType};
use chrono::{NaiveDate, NaiveDateTime};

/// Placeholder for an empty cell.
pub const EMPTY_CELL: &str = "—";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    /// `None` when the service timestamp could not be parsed.
    pub date: Option<NaiveDate>,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub late: bool,
    /// Timestamp exactly as the service sent it.
    pub raw: String,
}

impl ReportRow {
    fn from_event(event: &AttendanceEvent) -> Self {
        let parsed = match parse_event_time(&event.event_time) {
            Ok(t) => Some(t),
            Err(err) => {
                tracing::warn!(error = %err, "attendance event with bad timestamp");
                None
            }
        };
        let (check_in, check_out) = match event.event_type {
            EventType::Checkin => (parsed, None),
            EventType::Checkout => (None, parsed),
        };
        Self {
            date: parsed.map(|t| t.date()),
            check_in,
            check_out,
            late: event.is_late(),
            raw: event.event_time.clone(),
        }
    }
}

pub fn build_report(events: &[AttendanceEvent]) -> Vec<ReportRow> {
    events.iter().map(ReportRow::from_event).collect()
}

/// `YYYY-MM-DD HH:MM:SS`, or the empty-cell marker.
pub fn format_time(value: Option<&NaiveDateTime>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| EMPTY_CELL.to_string())
}

pub fn format_date(value: Option<&NaiveDate>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| EMPTY_CELL.to_string())
}
