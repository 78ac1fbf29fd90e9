//! V4L2 device backend.
//!
//! Opens a local device node (e.g. /dev/video0), negotiates packed RGB
//! output, and pulls frames from a memory-mapped buffer stream. The mmap
//! stream borrows from the device handle, hence the self-referencing state
//! struct.

use ouroboros::self_referencing;

use super::{CameraConfig, CaptureError};
use crate::frame::Frame;

pub(super) struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceState>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceCamera {
    pub(super) fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
        }
    }

    pub(super) fn connect(&mut self) -> Result<(), CaptureError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let rgb = v4l::FourCC::new(b"RGB3");

        let mut device = v4l::Device::with_path(&self.config.device).map_err(|err| {
            CaptureError::Disconnected(format!("open {}: {}", self.config.device, err))
        })?;
        let mut format = device
            .format()
            .map_err(|err| CaptureError::Device(format!("read format: {}", err)))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = rgb;

        let format = device
            .set_format(&format)
            .map_err(|err| CaptureError::Device(format!("set format: {}", err)))?;
        if format.fourcc != rgb {
            return Err(CaptureError::Device(format!(
                "{} does not support packed RGB output (offered {})",
                self.config.device, format.fourcc
            )));
        }

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "camera: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| CaptureError::Device(format!("create buffer stream: {}", err)))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "camera: connected to {} ({}x{})",
            self.config.device,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    pub(super) fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| CaptureError::Disconnected("device not connected".to_string()))?;
        let expected = self.active_width as usize * self.active_height as usize * 3;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| CaptureError::Device(format!("dequeue frame: {}", err)))?;

        if buf.len() < expected {
            return Err(CaptureError::Device(format!(
                "short frame: expected {} bytes, got {}",
                expected,
                buf.len()
            )));
        }

        self.frame_count += 1;
        Frame::from_rgb8(
            self.active_width,
            self.active_height,
            buf[..expected].to_vec(),
        )
        .map_err(|err| CaptureError::Device(err.to_string()))
    }

    pub(super) fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
