//! Builds the adapters a capture page runs against from the configuration.

use crate::config::Config;
use crate::console::ConsoleSink;
use crate::session::PersistentAuth;
use anyhow::{Context, Result};
use attend_client::{HttpSubmitter, IdentityToolkitAuth};
use attend_core::auth::AuthProvider;
use attend_core::{Adapters, CaptureDevice, ControllerConfig, Coordinates, Locator, PageConfig};
use attend_hw::{spawn_camera, CameraSettings, FixedLocator, GeoClueLocator, NoCamera, StillFile};
use std::path::Path;
use std::sync::Arc;

pub fn camera_settings(config: &Config) -> CameraSettings {
    CameraSettings {
        device: config.camera_device.clone(),
        width: config.camera_width,
        height: config.camera_height,
        warmup_frames: config.warmup_frames,
        jpeg_quality: config.jpeg_quality,
    }
}

/// The still file when given, else the configured camera. A camera that
/// cannot be opened still yields a device so the page mounts and reports
/// the failure on each capture.
pub async fn camera(config: &Config, photo: Option<&Path>) -> Arc<dyn CaptureDevice> {
    if let Some(path) = photo {
        tracing::info!(path = %path.display(), "using still image instead of camera");
        return Arc::new(StillFile::new(path));
    }

    let settings = camera_settings(config);
    let opened = tokio::task::spawn_blocking(move || spawn_camera(&settings)).await;
    match opened {
        Ok(Ok(handle)) => Arc::new(handle),
        Ok(Err(err)) => {
            tracing::warn!(device = %config.camera_device, error = %err, "camera unavailable");
            Arc::new(NoCamera::new(err.to_string()))
        }
        Err(err) => {
            tracing::warn!(error = %err, "camera open task failed");
            Arc::new(NoCamera::new(err.to_string()))
        }
    }
}

pub fn locator(config: &Config) -> Arc<dyn Locator> {
    match config.fixed_location {
        Some(loc) => Arc::new(FixedLocator::new(Coordinates::new(loc.latitude, loc.longitude))),
        None => Arc::new(GeoClueLocator::new(config.desktop_id.clone())),
    }
}

pub fn auth_provider(config: &Config) -> Result<Arc<dyn AuthProvider>> {
    let api_key = config.auth_api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        tracing::debug!("no identity API key configured; sign-in will fail");
    }
    let provider = IdentityToolkitAuth::new(api_key, config.request_timeout())
        .context("failed to build identity client")?;
    Ok(Arc::new(PersistentAuth::new(
        Arc::new(provider),
        config.session_file.clone(),
    )))
}

pub async fn adapters(config: &Config, photo: Option<&Path>) -> Result<Adapters> {
    let submitter = HttpSubmitter::new(config.server_url.clone(), config.request_timeout())
        .context("failed to build HTTP client")?;
    Ok(Adapters {
        camera: camera(config, photo).await,
        locator: locator(config),
        submitter: Arc::new(submitter),
        sink: Arc::new(ConsoleSink),
    })
}

pub fn controller_config(config: &Config) -> ControllerConfig {
    ControllerConfig {
        locate_timeout: config.locate_timeout(),
        ..ControllerConfig::default()
    }
}

pub fn enroll_page(config: &Config) -> PageConfig {
    PageConfig {
        session_expiry: config.session_expiry(),
        clock_tick: config.clock_tick(),
    }
}

pub fn attendance_page(config: &Config) -> PageConfig {
    PageConfig {
        session_expiry: None,
        clock_tick: config.clock_tick(),
    }
}
