//! attend-core — Capture-and-submit workflow for the attendance client.
//!
//! Holds the domain types, the adapter traits for camera, location and
//! submission, the capture session controller and the page lifecycle that
//! wraps it (session expiry, clock), plus the late check-in rule shared by
//! the admin views.

pub mod adapters;
pub mod attendance;
pub mod auth;
pub mod controller;
pub mod notify;
pub mod page;
pub mod types;

#[cfg(test)]
mod testing;

pub use adapters::{CaptureDevice, CaptureError, LocateError, Locator, Submitter};
pub use controller::{Action, Adapters, CaptureController, ControllerConfig, SessionState, Trigger};
pub use notify::{Notification, NotificationKind, NotificationSink};
pub use page::{CapturePage, PageConfig, PageExit};
pub use types::{
    ActionKind, ActionRecord, CaptureRequest, Coordinates, Endpoint, Endpoints, ErrorKind,
    SubmissionOutcome,
};
