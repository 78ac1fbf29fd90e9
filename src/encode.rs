//! JPEG frame encoder.
//!
//! Compresses an annotated frame into a transmittable byte buffer at a
//! fixed quality, so every chunk on the wire is produced the same way.

use std::fmt;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::frame::Frame;

/// Default compression quality for stream chunks.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug)]
pub enum EncodeError {
    /// Zero-sized input; nothing to compress.
    EmptyFrame,
    /// Codec rejected the frame.
    Codec(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::EmptyFrame => write!(f, "cannot encode a zero-sized frame"),
            EncodeError::Codec(detail) => write!(f, "jpeg encode failed: {}", detail),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Encode a frame as JPEG at the given quality (clamped to 1..=100).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
    if frame.width() == 0 || frame.height() == 0 || frame.is_empty() {
        return Err(EncodeError::EmptyFrame);
    }

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode(
            frame.data(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|err| EncodeError::Codec(err.to_string()))?;

    if buffer.is_empty() {
        return Err(EncodeError::Codec("encoder produced no bytes".to_string()));
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push(96);
            }
        }
        Frame::from_rgb8(width, height, data).unwrap()
    }

    #[test]
    fn zero_sized_frame_is_rejected() {
        let frame = Frame::from_rgb8(0, 0, vec![]).unwrap();
        assert!(matches!(
            encode_jpeg(&frame, DEFAULT_JPEG_QUALITY),
            Err(EncodeError::EmptyFrame)
        ));
    }

    #[test]
    fn encode_is_deterministic_for_the_same_input() -> Result<()> {
        let frame = gradient_frame(64, 48);
        let a = encode_jpeg(&frame, DEFAULT_JPEG_QUALITY)?;
        let b = encode_jpeg(&frame, DEFAULT_JPEG_QUALITY)?;
        assert!(!a.is_empty());
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn round_trip_preserves_dimensions_and_content() -> Result<()> {
        let frame = gradient_frame(96, 64);
        let jpeg = encode_jpeg(&frame, DEFAULT_JPEG_QUALITY)?;

        let decoded = image::load_from_memory(&jpeg)?.to_rgb8();
        assert_eq!(decoded.width(), 96);
        assert_eq!(decoded.height(), 64);

        // Mean absolute error across samples stays small for a smooth
        // gradient at this quality.
        let original = frame.data();
        let roundtrip = decoded.into_raw();
        let total: u64 = original
            .iter()
            .zip(roundtrip.iter())
            .map(|(&a, &b)| (a as i64 - b as i64).unsigned_abs())
            .sum();
        let mean = total as f64 / original.len() as f64;
        assert!(mean < 10.0, "mean absolute error too high: {}", mean);
        Ok(())
    }
}
