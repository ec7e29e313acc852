//! Raw buffer conversion and JPEG encoding.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("buffer is not a JPEG image")]
    NotJpeg,
    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// True if the buffer starts with a JPEG start-of-image marker.
pub fn is_jpeg(buf: &[u8]) -> bool {
    buf.len() > 4 && buf[0] == 0xFF && buf[1] == 0xD8
}

/// Convert packed YUYV (4:2:2) to interleaved RGB8 using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = y as f32;
            rgb.push(clamp_u8(y + 1.402 * v));
            rgb.push(clamp_u8(y - 0.344_136 * u - 0.714_136 * v));
            rgb.push(clamp_u8(y + 1.772 * u));
        }
    }
    Ok(rgb)
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

pub fn encode_rgb_jpeg(
    rgb: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, FrameError> {
    encode(rgb, width, height, quality, ExtendedColorType::Rgb8, 3)
}

pub fn encode_gray_jpeg(
    gray: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, FrameError> {
    encode(gray, width, height, quality, ExtendedColorType::L8, 1)
}

fn encode(
    data: &[u8],
    width: u32,
    height: u32,
    quality: u8,
    color: ExtendedColorType,
    channels: usize,
) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height) as usize * channels;
    if data.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: data.len(),
        });
    }
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder.encode(&data[..expected], width, height, color)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb_neutral_chroma() {
        // U = V = 128 means no chroma: RGB equals luma.
        let yuyv = vec![100, 128, 200, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb, vec![100, 100, 100, 200, 200, 200]);
    }

    #[test]
    fn test_yuyv_to_rgb_clamps() {
        let yuyv = vec![255, 255, 255, 255];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.len(), 6);
        assert_eq!(rgb[0], 255);
        assert_eq!(rgb[2], 255);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let result = yuyv_to_rgb(&[100, 128], 2, 1);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLength {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_encode_gray_produces_jpeg() {
        let gray = vec![128u8; 16 * 8];
        let jpeg = encode_gray_jpeg(&gray, 16, 8, 85).unwrap();
        assert!(is_jpeg(&jpeg));
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let rgb = vec![0u8; 10];
        assert!(encode_rgb_jpeg(&rgb, 4, 4, 85).is_err());
    }

    #[test]
    fn test_is_jpeg() {
        assert!(is_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]));
        assert!(!is_jpeg(&[0x89, b'P', b'N', b'G', 0x0D]));
        assert!(!is_jpeg(&[]));
    }
}
