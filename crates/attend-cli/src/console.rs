//! Terminal rendering: notifications on stderr, tables on stdout.

use attend_client::report::{format_date, format_time, ReportRow, EMPTY_CELL};
use attend_core::attendance::{parse_event_time, UserRecord};
use attend_core::{ActionRecord, Notification, NotificationKind, NotificationSink};

/// Prints every notification as one stderr line.
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, notification: Notification) {
        tracing::debug!(kind = ?notification.kind, tag = ?notification.tag, "notification");
        eprintln!("{}", render_notification(&notification));
    }
}

pub fn render_notification(n: &Notification) -> String {
    let marker = match n.kind {
        NotificationKind::Success => "[ok]",
        NotificationKind::Error => "[error]",
        NotificationKind::Progress => "[..]",
        NotificationKind::Info => "[info]",
    };
    format!("{marker} {}", n.message)
}

pub fn render_action(record: Option<&ActionRecord>) -> String {
    let Some(r) = record else {
        return "No action yet".to_string();
    };
    let result = match (&r.error, r.succeeded) {
        (_, true) => "succeeded".to_string(),
        (Some(err), false) => format!("failed ({err})"),
        (None, false) => "failed".to_string(),
    };
    format!(
        "{} on {} at {}: {result}",
        r.kind.display_name(),
        r.date.format("%Y-%m-%d"),
        r.time.format("%H:%M:%S")
    )
}

fn cell(value: Option<&str>) -> String {
    value.unwrap_or(EMPTY_CELL).to_string()
}

fn timestamp_cell(raw: Option<&str>) -> String {
    match raw {
        Some(raw) => parse_event_time(raw)
            .map(|t| format_time(Some(&t)))
            .unwrap_or_else(|_| raw.to_string()),
        None => EMPTY_CELL.to_string(),
    }
}

/// Admin user table. Late check-ins are suffixed with `(late)`.
pub fn render_users(users: &[UserRecord]) -> String {
    let mut out = format!(
        "{:<20} {:<28} {:<10} {:<28} {:<20}\n",
        "NAME", "EMAIL", "ROLE", "LATEST CHECK-IN", "LATEST CHECK-OUT"
    );
    for u in users {
        let mut checkin = timestamp_cell(u.latest_checkin.as_deref());
        if u.latest_checkin_late() {
            checkin.push_str(" (late)");
        }
        out.push_str(&format!(
            "{:<20} {:<28} {:<10} {:<28} {:<20}\n",
            u.name,
            cell(u.email.as_deref()),
            cell(u.role.as_deref()),
            checkin,
            timestamp_cell(u.latest_checkout.as_deref()),
        ));
    }
    out
}

pub fn render_report(username: &str, rows: &[ReportRow]) -> String {
    if rows.is_empty() {
        return format!("No attendance records found for {username}.\n");
    }
    let mut out = format!("Attendance report for {username}\n");
    out.push_str(&format!(
        "{:<12} {:<28} {:<20}\n",
        "DATE", "CHECK-IN", "CHECK-OUT"
    ));
    for row in rows {
        let date = match row.date {
            Some(d) => format_date(Some(&d)),
            None => row.raw.clone(),
        };
        let mut checkin = format_time(row.check_in.as_ref());
        if row.late {
            checkin.push_str(" (late)");
        }
        out.push_str(&format!(
            "{:<12} {:<28} {:<20}\n",
            date,
            checkin,
            format_time(row.check_out.as_ref())
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use attend_client::build_report;
    use attend_core::attendance::{AttendanceEvent, EventType};
    use attend_core::ActionKind;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_render_notification() {
        assert_eq!(
            render_notification(&Notification::error("Verification failed.")),
            "[error] Verification failed."
        );
        assert_eq!(
            render_notification(&Notification::progress("Processing...")),
            "[..] Processing..."
        );
    }

    #[test]
    fn test_render_action() {
        assert_eq!(render_action(None), "No action yet");
        let record = ActionRecord {
            kind: ActionKind::CheckIn,
            time: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            succeeded: false,
            error: Some("Connection error".into()),
        };
        assert_eq!(
            render_action(Some(&record)),
            "Check-In on 2024-05-06 at 09:15:00: failed (Connection error)"
        );
    }

    #[test]
    fn test_user_table_flags_late_checkin() {
        let users = vec![
            UserRecord {
                name: "Asha".into(),
                email: Some("asha@example.com".into()),
                latest_checkin: Some("2024-05-06T09:15:00".into()),
                ..UserRecord::default()
            },
            UserRecord {
                name: "Ravi".into(),
                latest_checkin: Some("2024-05-06T09:00:00".into()),
                ..UserRecord::default()
            },
        ];
        let table = render_users(&users);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Asha") && lines[1].contains("(late)"));
        assert!(lines[2].starts_with("Ravi") && !lines[2].contains("(late)"));
        assert!(lines[2].contains(EMPTY_CELL));
    }

    #[test]
    fn test_report_table() {
        assert_eq!(render_report("Asha", &[]), "No attendance records found for Asha.\n");

        let rows = build_report(&[AttendanceEvent {
            event_type: EventType::Checkin,
            event_time: "2024-05-06T09:15:00".into(),
        }]);
        let text = render_report("Asha", &rows);
        assert!(text.contains("2024-05-06 09:15:00 (late)"));
    }
}
