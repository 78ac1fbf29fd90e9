//! Camera capture source.
//!
//! This module owns the physical camera handle and exposes one operation:
//! `capture()`, which blocks until the next frame is available.
//!
//! Two backends sit behind the `Camera` front type:
//! - Synthetic generator for `stub://` device paths (tests, demos)
//! - V4L2 device nodes (feature: capture-v4l2)
//!
//! The capture layer does not retry internally; a failed read surfaces as a
//! `CaptureError` and the caller decides what dies with it. Exactly one
//! `Camera` exists per process and it is owned by the publisher thread, so
//! device access is serialized by ownership rather than a lock.

use std::fmt;
use std::time::{Duration, Instant};

use crate::frame::Frame;

#[cfg(feature = "capture-v4l2")]
mod v4l2;

/// Capture failure, distinguishable from application errors.
#[derive(Debug)]
pub enum CaptureError {
    /// Device could not be opened, or went away mid-stream.
    Disconnected(String),
    /// A single blocking read exceeded the configured bound.
    Timeout(Duration),
    /// Driver or read failure other than a disconnect.
    Device(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Disconnected(detail) => write!(f, "camera disconnected: {}", detail),
            CaptureError::Timeout(waited) => {
                write!(f, "camera read exceeded {}ms", waited.as_millis())
            }
            CaptureError::Device(detail) => write!(f, "camera read failed: {}", detail),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Anything the stream publisher can pull frames from.
///
/// `Camera` is the production implementation; tests substitute scripted
/// sources to drive the pipeline through failure paths.
pub trait FrameSource: Send {
    /// Block until the next frame is available.
    fn capture(&mut self) -> Result<Frame, CaptureError>;

    /// Reacquire the underlying device after a capture failure.
    fn reconnect(&mut self) -> Result<(), CaptureError>;
}

/// Configuration for a capture source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g. "/dev/video0"), or "stub://..." for the synthetic
    /// backend.
    pub device: String,
    /// Target frame rate hint passed to the device driver.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Upper bound on a single blocking read. Zero disables the bound.
    pub capture_timeout: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            capture_timeout: Duration::from_secs(5),
        }
    }
}

/// Camera capture source.
///
/// Uses V4L2 for real device nodes, with a synthetic fallback for `stub://`
/// paths.
pub struct Camera {
    backend: CameraBackend,
    config: CameraConfig,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "capture-v4l2")]
    Device(v4l2::DeviceCamera),
}

impl Camera {
    pub fn new(config: CameraConfig) -> Result<Self, CaptureError> {
        let backend = Self::backend_for(&config)?;
        Ok(Self { backend, config })
    }

    fn backend_for(config: &CameraConfig) -> Result<CameraBackend, CaptureError> {
        if config.device.starts_with("stub://") {
            return Ok(CameraBackend::Synthetic(SyntheticCamera::new(
                config.clone(),
            )));
        }
        #[cfg(feature = "capture-v4l2")]
        {
            Ok(CameraBackend::Device(v4l2::DeviceCamera::new(
                config.clone(),
            )))
        }
        #[cfg(not(feature = "capture-v4l2"))]
        {
            Err(CaptureError::Disconnected(format!(
                "device '{}' requires the capture-v4l2 feature",
                config.device
            )))
        }
    }

    /// Open the underlying device. Must be called once before `capture()`.
    pub fn connect(&mut self) -> Result<(), CaptureError> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Frames captured so far.
    pub fn frames_captured(&self) -> u64 {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.frame_count,
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.frames_captured(),
        }
    }
}

impl FrameSource for Camera {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        let started = Instant::now();
        let frame = match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame()?,
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(source) => source.next_frame()?,
        };
        // A hung driver read cannot be interrupted portably; the bound is
        // enforced once the read returns.
        let bound = self.config.capture_timeout;
        if !bound.is_zero() && started.elapsed() > bound {
            return Err(CaptureError::Timeout(bound));
        }
        Ok(frame)
    }

    fn reconnect(&mut self) -> Result<(), CaptureError> {
        self.connect()
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and cameraless demos
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<(), CaptureError> {
        log::info!("camera: connected to {} (synthetic)", self.config.device);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        self.frame_count += 1;
        let width = self.config.width;
        let height = self.config.height;
        let mut data = vec![0u8; width as usize * height as usize * 3];

        // Diagonal gradient background with a block that slides one column
        // per frame, so consecutive frames always differ.
        let block = width.max(1) / 8;
        let block_x = (self.frame_count as u32 * 2) % width.max(1);
        for y in 0..height {
            for x in 0..width {
                let idx = (y as usize * width as usize + x as usize) * 3;
                let in_block = x >= block_x
                    && x < block_x.saturating_add(block)
                    && y >= height / 3
                    && y < height / 3 + block.max(1);
                if in_block {
                    data[idx] = 255;
                    data[idx + 1] = 255;
                    data[idx + 2] = 255;
                } else {
                    let shade = ((x + y + self.frame_count as u32) % 200) as u8;
                    data[idx] = shade;
                    data[idx + 1] = shade / 2;
                    data[idx + 2] = 64;
                }
            }
        }

        Frame::from_rgb8(width, height, data)
            .map_err(|e| CaptureError::Device(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            width: 64,
            height: 48,
            ..CameraConfig::default()
        }
    }

    #[test]
    fn synthetic_camera_produces_frames() -> Result<(), CaptureError> {
        let mut camera = Camera::new(stub_config())?;
        camera.connect()?;

        let frame = camera.capture()?;
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.data().len(), 64 * 48 * 3);
        assert_eq!(camera.frames_captured(), 1);
        Ok(())
    }

    #[test]
    fn consecutive_synthetic_frames_differ() -> Result<(), CaptureError> {
        let mut camera = Camera::new(stub_config())?;
        camera.connect()?;

        let first = camera.capture()?;
        let second = camera.capture()?;
        assert_ne!(first, second);
        Ok(())
    }

    #[cfg(not(feature = "capture-v4l2"))]
    #[test]
    fn device_path_requires_feature() {
        let config = CameraConfig {
            device: "/dev/video0".to_string(),
            ..CameraConfig::default()
        };
        assert!(matches!(
            Camera::new(config),
            Err(CaptureError::Disconnected(_))
        ));
    }
}
