//! Overlay renderer.
//!
//! Pure annotation: draws detection results onto a private copy of a frame.
//! Each localized symbol gets a closed outline along its quadrilateral, and
//! every decoded payload is written as a text label at a fixed screen
//! position (stacked per detection), independent of where the symbol sits
//! in the frame.

use crate::detect::Detection;
use crate::frame::Frame;
use crate::glyph;

/// Outline and label color.
const OVERLAY_COLOR: [u8; 3] = [0, 255, 0];
/// Fixed top-left position of the first label.
const LABEL_ORIGIN: (i32, i32) = (10, 30);
/// Vertical distance between stacked labels.
const LABEL_STRIDE: i32 = 16;
/// Label glyph scale (5x7 font).
const LABEL_SCALE: i32 = 2;
/// Outline stroke thickness in pixels.
const OUTLINE_THICKNESS: i32 = 2;

/// Produce an annotated copy of `frame`. The input is never mutated.
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Frame {
    let mut annotated = frame.clone();
    let width = annotated.width();
    let height = annotated.height();

    for detection in detections {
        if let Some(polygon) = &detection.polygon {
            for i in 0..polygon.len() {
                let from = polygon[i];
                let to = polygon[(i + 1) % polygon.len()];
                draw_line(
                    annotated.data_mut(),
                    width,
                    height,
                    from.x,
                    from.y,
                    to.x,
                    to.y,
                );
            }
        }
    }

    for (i, detection) in detections.iter().enumerate() {
        let label = format!("Barcode: {}", detection.payload);
        glyph::draw_text(
            annotated.data_mut(),
            width,
            height,
            LABEL_ORIGIN.0,
            LABEL_ORIGIN.1 + i as i32 * LABEL_STRIDE,
            &label,
            OVERLAY_COLOR,
            LABEL_SCALE,
        );
    }

    annotated
}

/// Bresenham line, stroked `OUTLINE_THICKNESS` wide, clipped per pixel.
fn draw_line(buf: &mut [u8], width: u32, height: u32, mut x0: i32, mut y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    loop {
        stroke(buf, width, height, x0, y0);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn stroke(buf: &mut [u8], width: u32, height: u32, x: i32, y: i32) {
    for dy in 0..OUTLINE_THICKNESS {
        for dx in 0..OUTLINE_THICKNESS {
            let px = x + dx;
            let py = y + dy;
            if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                continue;
            }
            let idx = (py as usize * width as usize + px as usize) * 3;
            buf[idx] = OVERLAY_COLOR[0];
            buf[idx + 1] = OVERLAY_COLOR[1];
            buf[idx + 2] = OVERLAY_COLOR[2];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Point;

    fn is_overlay_color(frame: &Frame, x: u32, y: u32) -> bool {
        let idx = (y as usize * frame.width() as usize + x as usize) * 3;
        &frame.data()[idx..idx + 3] == OVERLAY_COLOR
    }

    fn square_detection(payload: &str) -> Detection {
        Detection {
            payload: payload.to_string(),
            polygon: Some([
                Point { x: 40, y: 60 },
                Point { x: 100, y: 60 },
                Point { x: 100, y: 110 },
                Point { x: 40, y: 110 },
            ]),
        }
    }

    #[test]
    fn annotate_leaves_input_untouched() {
        let frame = Frame::filled(160, 140, 128);
        let before = frame.clone();
        let _ = annotate(&frame, &[square_detection("ABC123")]);
        assert_eq!(frame, before);
    }

    #[test]
    fn annotate_draws_outline_along_polygon() {
        let frame = Frame::filled(160, 140, 128);
        let out = annotate(&frame, &[square_detection("ABC123")]);

        // Points on each edge of the quadrilateral.
        assert!(is_overlay_color(&out, 70, 60));
        assert!(is_overlay_color(&out, 100, 85));
        assert!(is_overlay_color(&out, 70, 110));
        assert!(is_overlay_color(&out, 40, 85));
        // Interior stays untouched.
        assert!(!is_overlay_color(&out, 70, 85));
    }

    #[test]
    fn annotate_draws_label_at_fixed_position() {
        let frame = Frame::filled(320, 140, 128);
        let out = annotate(&frame, &[square_detection("ABC123")]);

        // Some overlay pixels must land inside the fixed label box,
        // wherever the polygon sits.
        let mut hits = 0;
        for y in 30..44u32 {
            for x in 10..200u32 {
                if is_overlay_color(&out, x, y) {
                    hits += 1;
                }
            }
        }
        assert!(hits > 0, "no label pixels at the fixed position");
    }

    #[test]
    fn labels_stack_per_detection() {
        let frame = Frame::filled(320, 140, 128);
        let mut second = square_detection("XYZ789");
        second.polygon = None;
        let out = annotate(&frame, &[square_detection("ABC123"), second]);

        let mut hits = 0;
        for y in 46..60u32 {
            for x in 10..200u32 {
                if is_overlay_color(&out, x, y) {
                    hits += 1;
                }
            }
        }
        assert!(hits > 0, "second label not stacked below the first");
    }

    #[test]
    fn no_detections_is_a_plain_copy() {
        let frame = Frame::filled(64, 48, 17);
        let out = annotate(&frame, &[]);
        assert_eq!(out, frame);
    }
}
