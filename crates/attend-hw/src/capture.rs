//! Capture adapters: the camera worker thread and its async handle, plus
//! file-backed and absent cameras.
//!
//! V4L2 calls block, so the camera lives on a dedicated OS thread and the
//! async side talks to it over a channel. The thread owns the device for
//! as long as any handle exists.

use crate::camera::{Camera, CameraError};
use crate::frame;
use async_trait::async_trait;
use attend_core::{CaptureDevice, CaptureError};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// Something the worker thread can pull JPEG stills from.
pub trait FrameSource: Send + 'static {
    fn still(&mut self) -> Result<Vec<u8>, CameraError>;
}

/// A V4L2 camera paired with its encode quality.
pub struct V4lSource {
    camera: Camera,
    jpeg_quality: u8,
}

impl FrameSource for V4lSource {
    fn still(&mut self) -> Result<Vec<u8>, CameraError> {
        self.camera.capture_jpeg(self.jpeg_quality)
    }
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub warmup_frames: usize,
    pub jpeg_quality: u8,
}

enum CameraRequest {
    Capture {
        reply: oneshot::Sender<Result<Vec<u8>, CameraError>>,
    },
}

/// Clone-safe handle to the camera worker thread.
#[derive(Clone)]
pub struct CameraHandle {
    tx: mpsc::Sender<CameraRequest>,
}

/// Open the camera, discard warm-up frames, and move it onto its own
/// thread. Fails fast if the device cannot be opened.
pub fn spawn_camera(settings: &CameraSettings) -> Result<CameraHandle, CameraError> {
    let camera = Camera::open(&settings.device, settings.width, settings.height)?;
    tracing::info!(
        device = %settings.device,
        width = camera.width,
        height = camera.height,
        format = ?camera.pixel_format(),
        "camera opened"
    );

    if settings.warmup_frames > 0 {
        tracing::info!(count = settings.warmup_frames, "discarding warmup frames");
        camera.discard_frames(settings.warmup_frames)?;
    }

    spawn_worker(V4lSource {
        camera,
        jpeg_quality: settings.jpeg_quality,
    })
}

/// Serve capture requests from `source` on a dedicated thread.
pub fn spawn_worker<S: FrameSource>(mut source: S) -> Result<CameraHandle, CameraError> {
    let (tx, mut rx) = mpsc::channel::<CameraRequest>(4);

    std::thread::Builder::new()
        .name("attend-camera".into())
        .spawn(move || {
            tracing::info!("camera thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    CameraRequest::Capture { reply } => {
                        let _ = reply.send(source.still());
                    }
                }
            }
            tracing::info!("camera thread exiting");
        })
        .map_err(|e| CameraError::Worker(format!("failed to spawn camera thread: {e}")))?;

    Ok(CameraHandle { tx })
}

impl CameraHandle {
    async fn request(&self) -> Result<Vec<u8>, CameraError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CameraRequest::Capture { reply: reply_tx })
            .await
            .map_err(|_| CameraError::Worker("camera thread exited".into()))?;
        reply_rx
            .await
            .map_err(|_| CameraError::Worker("camera thread dropped the request".into()))?
    }
}

#[async_trait]
impl CaptureDevice for CameraHandle {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        match self.request().await {
            Ok(bytes) if bytes.is_empty() => Err(CaptureError::NoDevice("empty frame".into())),
            Ok(bytes) => Ok(bytes),
            Err(err) => Err(CaptureError::NoDevice(err.to_string())),
        }
    }
}

/// Serves a JPEG from disk on every capture, for headless stations.
pub struct StillFile {
    path: PathBuf,
}

impl StillFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CaptureDevice for StillFile {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CaptureError::NoDevice(format!("{}: {e}", self.path.display())))?;
        if !frame::is_jpeg(&bytes) {
            return Err(CaptureError::NoDevice(format!(
                "{}: not a JPEG image",
                self.path.display()
            )));
        }
        Ok(bytes)
    }
}

/// Stand-in when the camera could not be opened; every capture fails.
pub struct NoCamera {
    reason: String,
}

impl NoCamera {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CaptureDevice for NoCamera {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        Err(CaptureError::NoDevice(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Vec<Result<Vec<u8>, CameraError>>);

    impl FrameSource for Scripted {
        fn still(&mut self) -> Result<Vec<u8>, CameraError> {
            self.0.remove(0)
        }
    }

    fn jpeg() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0xFF, 0xD9]
    }

    #[tokio::test]
    async fn test_worker_serves_frames_in_order() {
        let handle = spawn_worker(Scripted(vec![
            Ok(jpeg()),
            Err(CameraError::CaptureFailed("timeout".into())),
            Ok(vec![]),
        ]))
        .unwrap();

        assert_eq!(handle.capture().await.unwrap(), jpeg());
        assert!(matches!(
            handle.capture().await,
            Err(CaptureError::NoDevice(msg)) if msg.contains("timeout")
        ));
        assert!(matches!(handle.capture().await, Err(CaptureError::NoDevice(_))));
    }

    #[tokio::test]
    async fn test_dead_worker_is_no_device() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = CameraHandle { tx };
        assert!(matches!(handle.capture().await, Err(CaptureError::NoDevice(_))));
    }

    #[tokio::test]
    async fn test_still_file() {
        let dir = std::env::temp_dir().join(format!("attend-hw-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("photo.jpg");
        let bad = dir.join("photo.png");
        std::fs::write(&good, jpeg()).unwrap();
        std::fs::write(&bad, b"\x89PNG\r\n").unwrap();

        assert_eq!(StillFile::new(&good).capture().await.unwrap(), jpeg());
        assert!(StillFile::new(&bad).capture().await.is_err());
        assert!(StillFile::new(dir.join("missing.jpg")).capture().await.is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_no_camera_reports_reason() {
        let err = NoCamera::new("/dev/video0 busy").capture().await.unwrap_err();
        assert_eq!(err, CaptureError::NoDevice("/dev/video0 busy".into()));
    }
}
