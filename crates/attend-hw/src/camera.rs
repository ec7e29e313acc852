//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, FrameError};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("frame conversion failed: {0}")]
    Frame(#[from] FrameError),
    #[error("camera worker unavailable: {0}")]
    Worker(String),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Pixel formats a still can be produced from, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Motion-JPEG; each buffer is already a complete JPEG still.
    Mjpg,
    /// YUYV 4:2:2 packed, converted to RGB before encoding.
    Yuyv,
    /// 8-bit grayscale.
    Grey,
}

impl PixelFormat {
    pub fn fourcc(self) -> FourCC {
        match self {
            PixelFormat::Mjpg => FourCC::new(b"MJPG"),
            PixelFormat::Yuyv => FourCC::new(b"YUYV"),
            PixelFormat::Grey => FourCC::new(b"GREY"),
        }
    }

    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        [PixelFormat::Mjpg, PixelFormat::Yuyv, PixelFormat::Grey]
            .into_iter()
            .find(|f| f.fourcc() == fourcc)
    }
}

/// An open capture device with a negotiated still format.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pixel_format: PixelFormat,
}

fn dequeue_failed(e: std::io::Error) -> CameraError {
    CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}"))
}

fn open_device(device_path: &str) -> Result<Device, CameraError> {
    if !Path::new(device_path).exists() {
        return Err(CameraError::DeviceNotFound(device_path.to_string()));
    }
    Device::with_path(device_path).map_err(|e| {
        if e.raw_os_error() == Some(16) || e.to_string().contains("busy") {
            CameraError::DeviceBusy
        } else {
            CameraError::DeviceNotFound(format!("{device_path}: {e}"))
        }
    })
}

/// Request MJPG at the given size. Drivers that cannot do it hand back their
/// closest format, which must still be one we can encode.
fn negotiate(
    device: &Device,
    width: u32,
    height: u32,
) -> Result<(u32, u32, PixelFormat), CameraError> {
    let mut wanted = device
        .format()
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("get format: {e}")))?;
    wanted.fourcc = PixelFormat::Mjpg.fourcc();
    wanted.width = width;
    wanted.height = height;

    let got = device
        .set_format(&wanted)
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("set format: {e}")))?;
    let format = PixelFormat::from_fourcc(got.fourcc).ok_or_else(|| {
        CameraError::FormatNegotiationFailed(format!(
            "driver offers {}, need MJPG, YUYV or GREY",
            got.fourcc
        ))
    })?;
    Ok((got.width, got.height, format))
}

impl Camera {
    /// Open a V4L2 device (e.g. "/dev/video0") and negotiate a still format
    /// close to `width`x`height`.
    pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        let device = open_device(device_path)?;
        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("query capabilities: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        let (width, height, pixel_format) = negotiate(&device, width, height)?;
        tracing::debug!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            width,
            height,
            format = ?pixel_format,
            "camera format negotiated"
        );

        Ok(Self {
            device,
            width,
            height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Dequeue and drop `count` frames so auto-exposure can settle.
    pub fn discard_frames(&self, count: usize) -> Result<(), CameraError> {
        if count == 0 {
            return Ok(());
        }
        let mut stream = self.stream()?;
        for _ in 0..count {
            stream.next().map_err(dequeue_failed)?;
        }
        Ok(())
    }

    /// Capture a single frame and return it as JPEG bytes.
    pub fn capture_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        let mut stream = self.stream()?;
        let (buf, meta) = stream.next().map_err(dequeue_failed)?;

        let used = (meta.bytesused as usize).min(buf.len());
        if used == 0 {
            return Err(CameraError::CaptureFailed("driver returned an empty buffer".into()));
        }
        tracing::debug!(seq = meta.sequence, bytes = used, "frame dequeued");

        self.encode(&buf[..used], quality)
    }

    fn encode(&self, buf: &[u8], quality: u8) -> Result<Vec<u8>, CameraError> {
        match self.pixel_format {
            PixelFormat::Mjpg => {
                if !frame::is_jpeg(buf) {
                    return Err(FrameError::NotJpeg.into());
                }
                Ok(buf.to_vec())
            }
            PixelFormat::Yuyv => {
                let rgb = frame::yuyv_to_rgb(buf, self.width, self.height)?;
                Ok(frame::encode_rgb_jpeg(&rgb, self.width, self.height, quality)?)
            }
            PixelFormat::Grey => Ok(frame::encode_gray_jpeg(
                buf,
                self.width,
                self.height,
                quality,
            )?),
        }
    }

    fn stream(&self) -> Result<MmapStream<'_>, CameraError> {
        MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))
    }

    /// Capture-capable devices among `/dev/video0..15`.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..16)
            .map(|i| format!("/dev/video{i}"))
            .filter(|path| Path::new(path).exists())
            .filter_map(|path| {
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card,
                        driver: caps.driver,
                        bus: caps.bus,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_mapping() {
        for format in [PixelFormat::Mjpg, PixelFormat::Yuyv, PixelFormat::Grey] {
            assert_eq!(PixelFormat::from_fourcc(format.fourcc()), Some(format));
        }
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"H264")), None);
    }

    #[test]
    fn test_open_missing_device() {
        let result = Camera::open("/dev/attend-does-not-exist", 640, 480);
        assert!(matches!(result, Err(CameraError::DeviceNotFound(_))));
    }
}
