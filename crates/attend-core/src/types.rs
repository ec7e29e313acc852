use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The three user-triggered actions that go through the capture workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Enroll,
    CheckIn,
    CheckOut,
}

impl ActionKind {
    /// Check-in and check-out need a location fix; enrollment does not.
    pub fn requires_location(self) -> bool {
        matches!(self, ActionKind::CheckIn | ActionKind::CheckOut)
    }

    /// Label shown to the user and stored in the last-action record.
    pub fn display_name(self) -> &'static str {
        match self {
            ActionKind::Enroll => "Enrollment",
            ActionKind::CheckIn => "Check-In",
            ActionKind::CheckOut => "Check-Out",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A WGS84 position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("image payload is empty")]
    EmptyImage,
    #[error("enrollment requires a subject label")]
    MissingLabel,
    #[error("{0} does not take a subject label")]
    UnexpectedLabel(ActionKind),
    #[error("{0} requires coordinates")]
    MissingCoordinates(ActionKind),
    #[error("{0} does not take coordinates")]
    UnexpectedCoordinates(ActionKind),
}

/// A fully assembled payload ready for the submission client.
///
/// Fields are private so that every value in circulation went through
/// [`CaptureRequest::new`] and holds its invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    action_kind: ActionKind,
    subject_label: Option<String>,
    image_bytes: Vec<u8>,
    coordinates: Option<Coordinates>,
}

impl CaptureRequest {
    pub fn new(
        action_kind: ActionKind,
        subject_label: Option<String>,
        image_bytes: Vec<u8>,
        coordinates: Option<Coordinates>,
    ) -> Result<Self, RequestError> {
        if image_bytes.is_empty() {
            return Err(RequestError::EmptyImage);
        }

        match (action_kind, &subject_label) {
            (ActionKind::Enroll, None) => return Err(RequestError::MissingLabel),
            (ActionKind::Enroll, Some(label)) if label.trim().is_empty() => {
                return Err(RequestError::MissingLabel)
            }
            (ActionKind::CheckIn | ActionKind::CheckOut, Some(_)) => {
                return Err(RequestError::UnexpectedLabel(action_kind))
            }
            _ => {}
        }

        match (action_kind.requires_location(), coordinates.is_some()) {
            (true, false) => return Err(RequestError::MissingCoordinates(action_kind)),
            (false, true) => return Err(RequestError::UnexpectedCoordinates(action_kind)),
            _ => {}
        }

        Ok(Self {
            action_kind,
            subject_label,
            image_bytes,
            coordinates,
        })
    }

    pub fn action_kind(&self) -> ActionKind {
        self.action_kind
    }

    pub fn subject_label(&self) -> Option<&str> {
        self.subject_label.as_deref()
    }

    pub fn image_bytes(&self) -> &[u8] {
        &self.image_bytes
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    /// Consume the request, yielding the image so it can be moved into a
    /// multipart body without copying.
    pub fn into_image(self) -> Vec<u8> {
        self.image_bytes
    }
}

/// Failure taxonomy of the capture workflow. None of these are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Camera unavailable or not ready.
    NoDevice,
    /// Location denied or no fix.
    LocationUnavailable,
    /// Network or transport failure; no response was received.
    ConnectionError,
    /// The server understood the request and declined it.
    Rejected,
}

/// Classified result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub succeeded: bool,
    pub message: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl SubmissionOutcome {
    pub fn success(message: Option<String>) -> Self {
        Self {
            succeeded: true,
            message,
            error_kind: None,
        }
    }

    pub fn rejected(message: Option<String>) -> Self {
        Self {
            succeeded: false,
            message,
            error_kind: Some(ErrorKind::Rejected),
        }
    }

    pub fn connection_error(message: Option<String>) -> Self {
        Self {
            succeeded: false,
            message,
            error_kind: Some(ErrorKind::ConnectionError),
        }
    }
}

/// Path of a submission endpoint, relative to the service base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Endpoint per action kind.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub enroll: Endpoint,
    pub check_in: Endpoint,
    pub check_out: Endpoint,
}

impl Endpoints {
    pub fn for_action(&self, kind: ActionKind) -> &Endpoint {
        match kind {
            ActionKind::Enroll => &self.enroll,
            ActionKind::CheckIn => &self.check_in,
            ActionKind::CheckOut => &self.check_out,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            enroll: Endpoint::new("/enroll-photo/"),
            check_in: Endpoint::new("/process-checkin"),
            check_out: Endpoint::new("/process-checkout"),
        }
    }
}

/// Summary of the most recent action on a page, shown next to the camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub time: NaiveTime,
    pub date: NaiveDate,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl ActionRecord {
    pub fn at(
        kind: ActionKind,
        when: DateTime<Local>,
        succeeded: bool,
        error: Option<String>,
    ) -> Self {
        let naive = when.naive_local();
        Self {
            kind,
            time: naive.time(),
            date: naive.date(),
            succeeded,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xD9]
    }

    #[test]
    fn test_enroll_request_requires_label() {
        let err = CaptureRequest::new(ActionKind::Enroll, None, jpeg(), None).unwrap_err();
        assert_eq!(err, RequestError::MissingLabel);

        let err = CaptureRequest::new(ActionKind::Enroll, Some("  ".into()), jpeg(), None)
            .unwrap_err();
        assert_eq!(err, RequestError::MissingLabel);
    }

    #[test]
    fn test_check_in_request_requires_coordinates() {
        let err = CaptureRequest::new(ActionKind::CheckIn, None, jpeg(), None).unwrap_err();
        assert_eq!(err, RequestError::MissingCoordinates(ActionKind::CheckIn));

        let req = CaptureRequest::new(
            ActionKind::CheckIn,
            None,
            jpeg(),
            Some(Coordinates::new(12.9, 77.6)),
        )
        .unwrap();
        assert_eq!(req.coordinates(), Some(Coordinates::new(12.9, 77.6)));
        assert_eq!(req.subject_label(), None);
    }

    #[test]
    fn test_request_rejects_mismatched_fields() {
        let err = CaptureRequest::new(
            ActionKind::CheckOut,
            Some("Asha".into()),
            jpeg(),
            Some(Coordinates::new(0.0, 0.0)),
        )
        .unwrap_err();
        assert_eq!(err, RequestError::UnexpectedLabel(ActionKind::CheckOut));

        let err = CaptureRequest::new(
            ActionKind::Enroll,
            Some("Asha".into()),
            jpeg(),
            Some(Coordinates::new(0.0, 0.0)),
        )
        .unwrap_err();
        assert_eq!(err, RequestError::UnexpectedCoordinates(ActionKind::Enroll));
    }

    #[test]
    fn test_request_rejects_empty_image() {
        let err = CaptureRequest::new(ActionKind::Enroll, Some("Asha".into()), vec![], None)
            .unwrap_err();
        assert_eq!(err, RequestError::EmptyImage);
    }

    #[test]
    fn test_default_endpoints() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.for_action(ActionKind::Enroll).path(), "/enroll-photo/");
        assert_eq!(endpoints.for_action(ActionKind::CheckIn).path(), "/process-checkin");
        assert_eq!(endpoints.for_action(ActionKind::CheckOut).path(), "/process-checkout");
    }

    #[test]
    fn test_only_attendance_actions_need_location() {
        assert!(!ActionKind::Enroll.requires_location());
        assert!(ActionKind::CheckIn.requires_location());
        assert!(ActionKind::CheckOut.requires_location());
    }
}
