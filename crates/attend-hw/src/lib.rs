//! attend-hw — Device adapters for the capture workflow.
//!
//! Provides V4L2 camera capture (JPEG stills served from a dedicated
//! thread) and position lookup through GeoClue2.

pub mod camera;
pub mod capture;
pub mod frame;
pub mod location;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use capture::{spawn_camera, CameraHandle, CameraSettings, NoCamera, StillFile};
pub use location::{FixedLocator, GeoClueLocator};
