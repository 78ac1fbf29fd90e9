//! QR detector backend.
//!
//! Localizes and decodes QR symbols with `rqrr` on a grayscale view of the
//! frame. A symbol that is localized but fails to decode (torn, occluded,
//! too small) is skipped rather than failing the whole frame.

use anyhow::Result;

use super::{Detection, Detector, DetectorInput, Point};

#[derive(Default)]
pub struct QrDetector;

impl QrDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for QrDetector {
    fn name(&self) -> &'static str {
        "qr"
    }

    fn input(&self) -> DetectorInput {
        DetectorInput::Luma8
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let w = width as usize;
        let h = height as usize;
        if pixels.len() < w * h {
            // Tolerate a malformed conversion by reporting nothing; the
            // pipeline treats detection as best-effort.
            log::warn!(
                "qr detector: luma buffer too small ({} for {}x{})",
                pixels.len(),
                width,
                height
            );
            return Ok(Vec::new());
        }

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| pixels[y * w + x]);

        let mut detections = Vec::new();
        for grid in prepared.detect_grids() {
            let polygon = grid.bounds.map(|corner| Point {
                x: corner.x,
                y: corner.y,
            });
            match grid.decode() {
                Ok((_meta, payload)) => detections.push(Detection {
                    payload,
                    polygon: Some(polygon),
                }),
                Err(err) => {
                    log::debug!("qr detector: undecodable symbol skipped: {}", err);
                }
            }
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    /// Rasterize a QR code into an RGB frame: black modules on white,
    /// `scale` pixels per module, placed at (offset_x, offset_y).
    fn frame_with_qr(
        payload: &str,
        width: u32,
        height: u32,
        scale: u32,
        offset_x: u32,
        offset_y: u32,
    ) -> (Frame, u32) {
        let code = qrcode::QrCode::new(payload.as_bytes()).expect("build qr code");
        let modules = code.width() as u32;
        let colors = code.to_colors();

        let mut data = vec![255u8; width as usize * height as usize * 3];
        for my in 0..modules {
            for mx in 0..modules {
                if colors[(my * modules + mx) as usize] != qrcode::Color::Dark {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = offset_x + mx * scale + dx;
                        let py = offset_y + my * scale + dy;
                        let idx = (py as usize * width as usize + px as usize) * 3;
                        data[idx] = 0;
                        data[idx + 1] = 0;
                        data[idx + 2] = 0;
                    }
                }
            }
        }
        (
            Frame::from_rgb8(width, height, data).unwrap(),
            modules * scale,
        )
    }

    #[test]
    fn decodes_synthetic_qr_with_payload_and_polygon() {
        let (frame, side) = frame_with_qr("ABC123", 320, 320, 8, 40, 40);
        let luma = frame.to_luma8();

        let mut detector = QrDetector::new();
        let detections = detector
            .detect(&luma, frame.width(), frame.height())
            .unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].payload, "ABC123");

        // The reported quadrilateral must sit on the rendered symbol,
        // within a two-module tolerance.
        let polygon = detections[0].polygon.expect("qr polygon");
        let tolerance = 16;
        let (min_x, max_x) = (40 - tolerance, 40 + side as i32 + tolerance);
        let (min_y, max_y) = (40 - tolerance, 40 + side as i32 + tolerance);
        for corner in &polygon {
            assert!(corner.x >= min_x && corner.x <= max_x, "corner {:?}", corner);
            assert!(corner.y >= min_y && corner.y <= max_y, "corner {:?}", corner);
        }
        let span_x = polygon.iter().map(|p| p.x).max().unwrap()
            - polygon.iter().map(|p| p.x).min().unwrap();
        let span_y = polygon.iter().map(|p| p.y).max().unwrap()
            - polygon.iter().map(|p| p.y).min().unwrap();
        assert!(span_x >= side as i32 - tolerance, "span_x {}", span_x);
        assert!(span_y >= side as i32 - tolerance, "span_y {}", span_y);
    }

    #[test]
    fn blank_frame_yields_empty_result_not_error() {
        let frame = Frame::filled(160, 120, 255);
        let luma = frame.to_luma8();
        let mut detector = QrDetector::new();
        let detections = detector
            .detect(&luma, frame.width(), frame.height())
            .unwrap();
        assert!(detections.is_empty());
    }
}
