//! In-process fakes for the adapter traits.

use crate::adapters::{CaptureDevice, CaptureError, LocateError, Locator, Submitter};
use crate::auth::{AuthError, AuthProvider, AuthUser};
use crate::controller::{Adapters, CaptureController, ControllerConfig};
use crate::notify::{ChannelSink, Notification};
use crate::types::{ActionKind, CaptureRequest, Coordinates, Endpoint, SubmissionOutcome};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

pub struct FakeCamera {
    result: Result<Vec<u8>, CaptureError>,
    calls: AtomicUsize,
}

impl FakeCamera {
    pub fn ok() -> Self {
        Self {
            result: Ok(vec![0xFF, 0xD8, 0xFF, 0xD9]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: CaptureError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for FakeCamera {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

pub struct FakeLocator {
    result: Result<Coordinates, LocateError>,
    calls: AtomicUsize,
}

impl FakeLocator {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            result: Ok(Coordinates::new(latitude, longitude)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: LocateError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Locator for FakeLocator {
    async fn locate(&self, _timeout: Duration) -> Result<Coordinates, LocateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

#[derive(Debug, Clone)]
pub struct SubmitCall {
    pub endpoint: String,
    pub kind: ActionKind,
    pub label: Option<String>,
    pub coordinates: Option<Coordinates>,
}

pub struct FakeSubmitter {
    outcome: SubmissionOutcome,
    calls: Mutex<Vec<SubmitCall>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeSubmitter {
    pub fn returning(outcome: SubmissionOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Blocks every submission until a permit is added to [`gate`](Self::gate).
    pub fn gated(outcome: SubmissionOutcome) -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::returning(outcome)
        }
    }

    pub fn gate(&self) -> Arc<Semaphore> {
        self.gate.clone().expect("submitter is not gated")
    }

    pub fn calls(&self) -> Vec<SubmitCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Submitter for FakeSubmitter {
    async fn submit(&self, endpoint: &Endpoint, request: CaptureRequest) -> SubmissionOutcome {
        self.calls.lock().unwrap().push(SubmitCall {
            endpoint: endpoint.path().to_string(),
            kind: request.action_kind(),
            label: request.subject_label().map(str::to_string),
            coordinates: request.coordinates(),
        });
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.outcome.clone()
    }
}

#[derive(Default)]
pub struct FakeAuth {
    sign_outs: AtomicUsize,
}

impl FakeAuth {
    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn sign_in(&self, email: &str, _password: &str) -> Result<AuthUser, AuthError> {
        Ok(AuthUser {
            uid: "fake".into(),
            email: email.into(),
            id_token: None,
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub controller: Arc<CaptureController>,
    pub camera: Arc<FakeCamera>,
    pub locator: Arc<FakeLocator>,
    pub submitter: Arc<FakeSubmitter>,
    pub notes: mpsc::UnboundedReceiver<Notification>,
    pub mount: CancellationToken,
}

pub fn adapters(
    camera: &Arc<FakeCamera>,
    locator: &Arc<FakeLocator>,
    submitter: &Arc<FakeSubmitter>,
) -> (Adapters, mpsc::UnboundedReceiver<Notification>) {
    let (sink, notes) = ChannelSink::new();
    let adapters = Adapters {
        camera: camera.clone(),
        locator: locator.clone(),
        submitter: submitter.clone(),
        sink: Arc::new(sink),
    };
    (adapters, notes)
}

pub fn harness(camera: FakeCamera, locator: FakeLocator, submitter: FakeSubmitter) -> Harness {
    let camera = Arc::new(camera);
    let locator = Arc::new(locator);
    let submitter = Arc::new(submitter);
    let (adapters, notes) = adapters(&camera, &locator, &submitter);
    let mount = CancellationToken::new();
    let controller = Arc::new(CaptureController::new(
        adapters,
        ControllerConfig::default(),
        mount.clone(),
    ));
    Harness {
        controller,
        camera,
        locator,
        submitter,
        notes,
        mount,
    }
}
