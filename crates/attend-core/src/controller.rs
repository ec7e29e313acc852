//! Capture session controller.
//!
//! Drives one user-triggered action end to end:
//!
//! ```text
//! Idle -> Capturing -> [Locating] -> Submitting -> CoolingDown -> Idle
//! ```
//!
//! `Locating` only happens for check-in/check-out. A trigger that arrives
//! while the controller is not `Idle` is dropped silently, not queued and
//! not validated. Every failure is recovered here: the state always returns
//! to `Idle` and the controller stays usable.
//!
//! Each controller is bound to the mount token of the page that owns it.
//! Once that token is cancelled, results still arriving from the camera,
//! the location service or the network are discarded instead of being
//! applied.

use crate::adapters::{CaptureDevice, Locator, Submitter};
use crate::notify::{Notification, NotificationSink};
use crate::types::{
    ActionKind, ActionRecord, CaptureRequest, Endpoints, ErrorKind, SubmissionOutcome,
};
use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Tag shared by the enrollment progress toast and its result.
const UPLOAD_TAG: &str = "upload";

const BLANK_LABEL_MSG: &str = "Please provide a name.";
const ENROLL_CAPTURE_FAILED_MSG: &str = "Unable to capture image. Please check your camera.";
const CAPTURE_FAILED_MSG: &str = "Error capturing image. Please try again.";
const PROCESSING_MSG: &str = "Processing...";
const LOCATION_FAILED_MSG: &str = "Could not get location. Please enable GPS.";
const LOCATION_REQUIRED: &str = "Location services required";
const VERIFICATION_FAILED_MSG: &str = "Verification failed.";
const REQUEST_FAILED_MSG: &str = "Request failed. Please try again.";
const CONNECTION_ERROR: &str = "Connection error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Capturing,
    Locating,
    Submitting,
    /// Outcome received; notifications and the last-action record are
    /// being applied.
    CoolingDown,
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Enroll { label: String },
    CheckIn,
    CheckOut,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Enroll { .. } => ActionKind::Enroll,
            Action::CheckIn => ActionKind::CheckIn,
            Action::CheckOut => ActionKind::CheckOut,
        }
    }
}

/// How a trigger ended, for callers that want more than notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A submission was made and classified.
    Completed(SubmissionOutcome),
    /// Stopped before submission (`NoDevice` or `LocationUnavailable`).
    Failed(ErrorKind),
    /// Precondition failed (blank enrollment label); nothing happened.
    InvalidInput,
    /// Another action was in flight.
    Dropped,
    /// The owning page went away while this action was in flight.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub endpoints: Endpoints,
    pub locate_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            locate_timeout: Duration::from_secs(10),
        }
    }
}

/// The collaborators a controller drives.
#[derive(Clone)]
pub struct Adapters {
    pub camera: Arc<dyn CaptureDevice>,
    pub locator: Arc<dyn Locator>,
    pub submitter: Arc<dyn Submitter>,
    pub sink: Arc<dyn NotificationSink>,
}

pub struct CaptureController {
    adapters: Adapters,
    config: ControllerConfig,
    state: watch::Sender<SessionState>,
    last_action: watch::Sender<Option<ActionRecord>>,
    mount: CancellationToken,
}

/// Returns the controller to `Idle` on every exit path.
struct BusyLatch<'a> {
    state: &'a watch::Sender<SessionState>,
}

impl Drop for BusyLatch<'_> {
    fn drop(&mut self) {
        self.state.send_replace(SessionState::Idle);
        tracing::debug!("controller idle");
    }
}

impl CaptureController {
    pub fn new(adapters: Adapters, config: ControllerConfig, mount: CancellationToken) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (last_action, _) = watch::channel(None);
        Self {
            adapters,
            config,
            state,
            last_action,
            mount,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn last_action(&self) -> Option<ActionRecord> {
        self.last_action.borrow().clone()
    }

    pub fn subscribe_last_action(&self) -> watch::Receiver<Option<ActionRecord>> {
        self.last_action.subscribe()
    }

    /// Run one action to completion. See the module docs for the state
    /// machine.
    pub async fn trigger(&self, action: Action) -> Trigger {
        if self.mount.is_cancelled() {
            return Trigger::Discarded;
        }

        let kind = action.kind();
        // A busy controller ignores triggers outright, before any validation.
        if self.state() != SessionState::Idle {
            tracing::debug!(action = %kind, state = ?self.state(), "trigger dropped, action in flight");
            return Trigger::Dropped;
        }

        let label = match action {
            Action::Enroll { label } if label.trim().is_empty() => {
                self.notify(Notification::error(BLANK_LABEL_MSG));
                return Trigger::InvalidInput;
            }
            Action::Enroll { label } => Some(label),
            Action::CheckIn | Action::CheckOut => None,
        };

        let acquired = self.state.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Capturing;
                true
            } else {
                false
            }
        });
        if !acquired {
            tracing::debug!(action = %kind, state = ?self.state(), "trigger dropped, action in flight");
            return Trigger::Dropped;
        }
        let _latch = BusyLatch { state: &self.state };
        tracing::debug!(action = %kind, "capturing");

        self.run(kind, label).await
    }

    async fn run(&self, kind: ActionKind, label: Option<String>) -> Trigger {
        let captured = self.adapters.camera.capture().await;
        if self.mount.is_cancelled() {
            return self.discard(kind);
        }
        let image = match captured {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(action = %kind, error = %err, "capture failed");
                return self.capture_failed(kind);
            }
        };

        let coordinates = if kind.requires_location() {
            self.enter(SessionState::Locating);
            let located = self
                .adapters
                .locator
                .locate(self.config.locate_timeout)
                .await;
            if self.mount.is_cancelled() {
                return self.discard(kind);
            }
            match located {
                Ok(coords) => Some(coords),
                Err(err) => {
                    tracing::warn!(action = %kind, error = %err, "locate failed");
                    self.notify(Notification::error(LOCATION_FAILED_MSG));
                    self.record(kind, false, Some(LOCATION_REQUIRED.to_string()));
                    return Trigger::Failed(ErrorKind::LocationUnavailable);
                }
            }
        } else {
            None
        };

        let request = match CaptureRequest::new(kind, label.clone(), image, coordinates) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(action = %kind, error = %err, "capture produced an unusable request");
                return self.capture_failed(kind);
            }
        };

        self.enter(SessionState::Submitting);
        if kind == ActionKind::Enroll {
            self.notify(Notification::progress(PROCESSING_MSG).tagged(UPLOAD_TAG));
        }
        let endpoint = self.config.endpoints.for_action(kind);
        let outcome = self.adapters.submitter.submit(endpoint, request).await;
        if self.mount.is_cancelled() {
            return self.discard(kind);
        }

        self.enter(SessionState::CoolingDown);
        self.settle(kind, label.as_deref(), &outcome);
        Trigger::Completed(outcome)
    }

    /// Emit the outcome notification and update the last-action record.
    fn settle(&self, kind: ActionKind, label: Option<&str>, outcome: &SubmissionOutcome) {
        if outcome.succeeded {
            tracing::info!(action = %kind, message = ?outcome.message, "submission succeeded");
        } else {
            tracing::warn!(
                action = %kind,
                error_kind = ?outcome.error_kind,
                message = ?outcome.message,
                "submission failed"
            );
        }

        match kind {
            ActionKind::Enroll => {
                let name = label.unwrap_or_default();
                if outcome.succeeded {
                    self.notify(
                        Notification::success(format!("Enrollment successful for {name}!"))
                            .tagged(UPLOAD_TAG),
                    );
                    self.record(kind, true, None);
                } else {
                    let cause = outcome
                        .message
                        .clone()
                        .unwrap_or_else(|| fallback_cause(outcome.error_kind).to_string());
                    self.notify(
                        Notification::error(format!("Upload failed: {cause}")).tagged(UPLOAD_TAG),
                    );
                    self.record(kind, false, Some(cause));
                }
            }
            ActionKind::CheckIn | ActionKind::CheckOut => {
                if outcome.succeeded {
                    let message = outcome
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("{kind} successful"));
                    self.notify(Notification::success(message));
                    self.record(kind, true, None);
                } else if outcome.error_kind == Some(ErrorKind::ConnectionError) {
                    let shown = outcome.message.as_deref().unwrap_or(REQUEST_FAILED_MSG);
                    self.notify(Notification::error(shown));
                    let cause = outcome.message.as_deref().unwrap_or(CONNECTION_ERROR);
                    self.record(kind, false, Some(cause.to_string()));
                } else {
                    let shown = outcome.message.as_deref().unwrap_or(VERIFICATION_FAILED_MSG);
                    self.notify(Notification::error(shown));
                    self.record(kind, false, outcome.message.clone());
                }
            }
        }
    }

    fn capture_failed(&self, kind: ActionKind) -> Trigger {
        let message = match kind {
            ActionKind::Enroll => ENROLL_CAPTURE_FAILED_MSG,
            ActionKind::CheckIn | ActionKind::CheckOut => CAPTURE_FAILED_MSG,
        };
        self.notify(Notification::error(message));
        Trigger::Failed(ErrorKind::NoDevice)
    }

    fn discard(&self, kind: ActionKind) -> Trigger {
        tracing::debug!(action = %kind, "page unmounted, discarding result");
        Trigger::Discarded
    }

    fn enter(&self, next: SessionState) {
        self.state.send_replace(next);
        tracing::debug!(state = ?next, "controller transition");
    }

    fn notify(&self, notification: Notification) {
        self.adapters.sink.notify(notification);
    }

    fn record(&self, kind: ActionKind, succeeded: bool, error: Option<String>) {
        self.last_action
            .send_replace(Some(ActionRecord::at(kind, Local::now(), succeeded, error)));
    }
}

fn fallback_cause(error_kind: Option<ErrorKind>) -> &'static str {
    match error_kind {
        Some(ErrorKind::ConnectionError) => CONNECTION_ERROR,
        _ => "request rejected",
    }
}
