//! Seams between the capture controller and the outside world.
//!
//! Camera, location service and submission client are all reached through
//! these traits so the controller can run against fakes in tests and
//! against `attend-hw` / `attend-client` in the binary.

use crate::types::{CaptureRequest, Coordinates, Endpoint, SubmissionOutcome};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Camera missing, not permitted, or not producing frames yet.
    #[error("no camera frame available: {0}")]
    NoDevice(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("location access denied: {0}")]
    Denied(String),
    #[error("no location fix within {0:?}")]
    Timeout(Duration),
    #[error("location service unavailable: {0}")]
    Unsupported(String),
}

/// Produces one still image (JPEG bytes) per call.
///
/// Implementations must never return an empty payload; a missing frame is
/// `CaptureError::NoDevice`. No retry happens inside the adapter.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError>;
}

/// Resolves the current position.
///
/// Each call issues its own platform request; concurrent calls are not
/// coalesced.
#[async_trait]
pub trait Locator: Send + Sync {
    async fn locate(&self, timeout: Duration) -> Result<Coordinates, LocateError>;
}

/// Posts a capture request and classifies the response.
///
/// Exactly one network attempt per call. Transport problems are reported
/// inside the outcome, never as an `Err`.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, endpoint: &Endpoint, request: CaptureRequest) -> SubmissionOutcome;
}
