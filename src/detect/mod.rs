//! Barcode detection backends.
//!
//! A detector scans one frame and returns zero or more decoded symbols. An
//! empty result is the normal "nothing in view" case, never an error.
//! Exactly one detector implementation runs per deployment, selected by
//! name from configuration; detectors are not combined or reconciled.

mod qr;
mod stub;

use anyhow::{anyhow, Result};

pub use qr::QrDetector;
pub use stub::StubDetector;

/// Integer pixel coordinate in the input frame's space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// One decoded symbol found in a frame.
///
/// The polygon is the symbol's bounding quadrilateral when the backend was
/// able to localize it; decode-only backends leave it absent.
#[derive(Clone, Debug)]
pub struct Detection {
    pub payload: String,
    pub polygon: Option<[Point; 4]>,
}

/// Pixel format a detector requires. The pipeline converts the captured
/// frame before calling `detect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorInput {
    Luma8,
    Rgb8,
}

/// Detector backend trait.
///
/// Implementations must treat the pixel slice as read-only and ephemeral,
/// and must return `Ok(vec![])` for a frame with no symbols.
pub trait Detector: Send {
    /// Backend identifier, matching the configuration name.
    fn name(&self) -> &'static str;

    /// Pixel format this backend expects.
    fn input(&self) -> DetectorInput;

    /// Scan one frame. `pixels` is packed in the format from `input()`.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;
}

/// Construct the deployment detector by configuration name.
pub fn detector_from_name(name: &str) -> Result<Box<dyn Detector>> {
    match name {
        "qr" => Ok(Box::new(QrDetector::new())),
        "stub" => Ok(Box::new(StubDetector::new())),
        other => Err(anyhow!(
            "unknown detector backend '{}'; expected 'qr' or 'stub'",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_selection_by_name() {
        assert_eq!(detector_from_name("qr").unwrap().name(), "qr");
        assert_eq!(detector_from_name("stub").unwrap().name(), "stub");
        assert!(detector_from_name("cuneiform").is_err());
    }
}
