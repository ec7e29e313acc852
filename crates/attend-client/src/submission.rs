//! Multipart submission of capture requests to the recognition service.

use async_trait::async_trait;
use attend_core::{ActionKind, CaptureRequest, Endpoint, SubmissionOutcome, Submitter};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Body shape of `/process-checkin` and `/process-checkout`.
#[derive(Debug, Deserialize)]
struct AttendanceReply {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Recognition service client. One POST per `submit`, never retried.
pub struct HttpSubmitter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSubmitter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

fn build_form(request: CaptureRequest) -> Result<Form, reqwest::Error> {
    let label = request.subject_label().map(str::to_string);
    let coordinates = request.coordinates();

    let mut form = Form::new().part(
        "photo",
        Part::bytes(request.into_image())
            .file_name("photo.jpg")
            .mime_str("image/jpeg")?,
    );
    if let Some(name) = label {
        form = form.text("name", name);
    }
    if let Some(coords) = coordinates {
        form = form
            .text("latitude", coords.latitude.to_string())
            .text("longitude", coords.longitude.to_string());
    }
    Ok(form)
}

/// Server-provided message, accepting `message` or a string `detail`.
fn reply_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("detail"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Map a received response onto an outcome.
///
/// Enrollment is judged by status alone; an error status is a rejection.
/// Check-in/out treat an error status as a failed request (the server's
/// message is kept) and otherwise need a `{success: true}` body.
pub fn classify(kind: ActionKind, status: StatusCode, body: &[u8]) -> SubmissionOutcome {
    match kind {
        ActionKind::Enroll if status.is_success() => {
            SubmissionOutcome::success(reply_message(body))
        }
        ActionKind::Enroll => SubmissionOutcome::rejected(reply_message(body)),
        ActionKind::CheckIn | ActionKind::CheckOut if !status.is_success() => {
            SubmissionOutcome::connection_error(reply_message(body))
        }
        ActionKind::CheckIn | ActionKind::CheckOut => {
            match serde_json::from_slice::<AttendanceReply>(body) {
                Ok(reply) if reply.success => SubmissionOutcome::success(reply.message),
                Ok(reply) => SubmissionOutcome::rejected(reply.message),
                Err(err) => {
                    tracing::warn!(error = %err, "unexpected attendance reply body");
                    SubmissionOutcome::rejected(None)
                }
            }
        }
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, endpoint: &Endpoint, request: CaptureRequest) -> SubmissionOutcome {
        let kind = request.action_kind();
        let url = self.url(endpoint);

        let mut builder = self.client.post(&url);
        if let Some(name) = request.subject_label() {
            builder = builder.query(&[("name", name)]);
        }
        let form = match build_form(request) {
            Ok(form) => form,
            Err(err) => {
                tracing::warn!(error = %err, "failed to build multipart body");
                return SubmissionOutcome::connection_error(None);
            }
        };

        tracing::debug!(action = %kind, %url, "submitting capture");
        let resp = match builder.multipart(form).send().await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::warn!(action = %kind, %url, error = %err, "submission transport failure");
                return SubmissionOutcome::connection_error(None);
            }
        };

        let status = resp.status();
        match resp.bytes().await {
            Ok(body) => {
                let outcome = classify(kind, status, &body);
                tracing::debug!(action = %kind, %status, succeeded = outcome.succeeded, "submission classified");
                outcome
            }
            Err(err) => {
                tracing::warn!(action = %kind, %status, error = %err, "response body lost");
                SubmissionOutcome::connection_error(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attend_core::{Coordinates, ErrorKind};

    #[test]
    fn test_check_in_success() {
        let outcome = classify(
            ActionKind::CheckIn,
            StatusCode::OK,
            br#"{"success":true,"message":"Checked in"}"#,
        );
        assert_eq!(outcome, SubmissionOutcome::success(Some("Checked in".into())));
    }

    #[test]
    fn test_check_out_rejected() {
        let outcome = classify(
            ActionKind::CheckOut,
            StatusCode::OK,
            br#"{"success":false,"message":"Face not recognized"}"#,
        );
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Rejected));
        assert_eq!(outcome.message.as_deref(), Some("Face not recognized"));
    }

    #[test]
    fn test_check_in_unexpected_body_is_rejected() {
        let outcome = classify(ActionKind::CheckIn, StatusCode::OK, b"<html>ok</html>");
        assert_eq!(outcome, SubmissionOutcome::rejected(None));
    }

    #[test]
    fn test_error_status_carries_server_message() {
        let outcome = classify(
            ActionKind::CheckIn,
            StatusCode::BAD_REQUEST,
            br#"{"message":"Outside office radius"}"#,
        );
        assert_eq!(
            outcome,
            SubmissionOutcome::connection_error(Some("Outside office radius".into()))
        );

        let outcome = classify(
            ActionKind::Enroll,
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"detail":"No face detected"}"#,
        );
        assert_eq!(outcome, SubmissionOutcome::rejected(Some("No face detected".into())));

        let outcome = classify(ActionKind::Enroll, StatusCode::INTERNAL_SERVER_ERROR, b"");
        assert_eq!(outcome, SubmissionOutcome::rejected(None));
    }

    #[test]
    fn test_check_in_error_status_without_body_is_request_failure() {
        for kind in [ActionKind::CheckIn, ActionKind::CheckOut] {
            let outcome = classify(kind, StatusCode::INTERNAL_SERVER_ERROR, b"");
            assert_eq!(outcome, SubmissionOutcome::connection_error(None));
        }
    }

    #[test]
    fn test_enroll_accepts_any_success_body() {
        assert!(classify(ActionKind::Enroll, StatusCode::OK, b"").succeeded);
        assert!(classify(ActionKind::Enroll, StatusCode::CREATED, b"[1,2]").succeeded);
        let outcome = classify(ActionKind::Enroll, StatusCode::OK, br#"{"message":"stored"}"#);
        assert_eq!(outcome.message.as_deref(), Some("stored"));
    }

    #[tokio::test]
    async fn test_refused_connection_is_connection_error() {
        let submitter = HttpSubmitter::new("http://127.0.0.1:1/", Duration::from_secs(5)).unwrap();
        assert_eq!(submitter.base_url(), "http://127.0.0.1:1");

        let request = CaptureRequest::new(
            ActionKind::CheckIn,
            None,
            vec![0xFF, 0xD8, 0xFF, 0xD9],
            Some(Coordinates::new(12.9, 77.6)),
        )
        .unwrap();
        let outcome = submitter
            .submit(&Endpoint::new("/process-checkin"), request)
            .await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_kind, Some(ErrorKind::ConnectionError));
        assert_eq!(outcome.message, None);
    }
}
