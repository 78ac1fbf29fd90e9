//! The shared capture loop.
//!
//! One worker thread owns the camera and the detector and drives
//! capture -> detect -> overlay -> encode -> publish, fanning encoded
//! frames out through a `FrameHub`.
//!
//! The loop is a small state machine:
//!
//! - `Idle`: no viewers attached; capture is paused.
//! - `Streaming`: at least one viewer; the pipeline runs.
//! - `Draining`: capture failed; every attached stream is ended and the
//!   camera is reacquired when the next viewer arrives.
//!
//! Only capture failures drain the loop. Detection failures overlay
//! nothing, encode failures skip the frame; both self-heal on the next
//! iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::capture::{CaptureError, FrameSource};
use crate::detect::{Detection, Detector, DetectorInput};
use crate::encode::{encode_jpeg, DEFAULT_JPEG_QUALITY};
use crate::frame::Frame;
use crate::overlay;
use crate::stream::{EncodedFrame, FrameHub};

#[derive(Clone, Debug)]
pub struct PublisherConfig {
    /// Frames per second ceiling. Zero leaves the loop unpaced.
    pub target_fps: u32,
    /// JPEG quality for published chunks.
    pub jpeg_quality: u8,
    /// How often to check for viewers while idle.
    pub idle_poll: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            target_fps: 10,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            idle_poll: Duration::from_millis(50),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopState {
    Idle,
    Streaming,
    Draining,
}

/// Handle to the running publisher thread.
pub struct Publisher {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl Publisher {
    /// Spawn the capture loop on its own thread. The camera and detector
    /// move into the thread; ownership is the mutual exclusion on the
    /// device handle.
    pub fn spawn(
        source: impl FrameSource + 'static,
        detector: Box<dyn Detector>,
        hub: FrameHub,
        config: PublisherConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        let thread_shutdown = shutdown.clone();
        let join = thread::Builder::new()
            .name("frame-publisher".into())
            .spawn(move || {
                let mut source = source;
                let mut detector = detector;
                run(
                    &mut source,
                    detector.as_mut(),
                    &hub,
                    &config,
                    &thread_shutdown,
                );
            })
            .context("spawn publisher thread")?;
        Ok(Self {
            shutdown,
            join: Some(join),
        })
    }

    /// Request shutdown and block until the loop exits.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("publisher thread panicked"))?;
        }
        Ok(())
    }
}

fn run(
    source: &mut dyn FrameSource,
    detector: &mut dyn Detector,
    hub: &FrameHub,
    config: &PublisherConfig,
    shutdown: &AtomicBool,
) {
    let mut state = LoopState::Idle;
    let mut seq: u64 = 0;
    let mut needs_reconnect = false;

    while !shutdown.load(Ordering::Relaxed) {
        state = match state {
            LoopState::Idle => {
                if hub.viewer_count() == 0 {
                    thread::sleep(config.idle_poll);
                    LoopState::Idle
                } else if needs_reconnect {
                    match source.reconnect() {
                        Ok(()) => {
                            needs_reconnect = false;
                            log::info!("camera reacquired");
                            LoopState::Streaming
                        }
                        Err(err) => {
                            log::error!("camera reacquisition failed: {}", err);
                            hub.close_all();
                            thread::sleep(config.idle_poll);
                            LoopState::Idle
                        }
                    }
                } else {
                    log::info!("stream active: {} viewer(s)", hub.viewer_count());
                    LoopState::Streaming
                }
            }
            LoopState::Streaming => {
                if hub.viewer_count() == 0 {
                    log::info!("stream idle: last viewer left");
                    LoopState::Idle
                } else {
                    match iterate(source, detector, hub, config, &mut seq) {
                        Ok(()) => LoopState::Streaming,
                        Err(err) => {
                            log::error!("capture failed, draining stream: {}", err);
                            LoopState::Draining
                        }
                    }
                }
            }
            LoopState::Draining => {
                hub.close_all();
                needs_reconnect = true;
                LoopState::Idle
            }
        };
    }

    hub.close_all();
    log::info!("publisher stopped after {} frame(s)", seq);
}

/// One pipeline iteration. Only a capture failure is returned; detection
/// and encoding are best-effort per frame.
fn iterate(
    source: &mut dyn FrameSource,
    detector: &mut dyn Detector,
    hub: &FrameHub,
    config: &PublisherConfig,
    seq: &mut u64,
) -> Result<(), CaptureError> {
    let started = Instant::now();
    let frame = source.capture()?;

    let detections = match run_detection(detector, &frame) {
        Ok(detections) => detections,
        Err(err) => {
            log::warn!("detection failed, overlaying nothing: {}", err);
            Vec::new()
        }
    };
    for detection in &detections {
        log::info!("detected barcode: {}", detection.payload);
    }

    let annotated = overlay::annotate(&frame, &detections);
    match encode_jpeg(&annotated, config.jpeg_quality) {
        Ok(jpeg) => {
            *seq += 1;
            hub.publish(Arc::new(EncodedFrame { seq: *seq, jpeg }));
        }
        Err(err) => {
            log::warn!("encode failed, frame skipped: {}", err);
        }
    }

    pace(started, config.target_fps);
    Ok(())
}

fn run_detection(detector: &mut dyn Detector, frame: &Frame) -> Result<Vec<Detection>> {
    match detector.input() {
        DetectorInput::Luma8 => {
            let luma = frame.to_luma8();
            detector.detect(&luma, frame.width(), frame.height())
        }
        DetectorInput::Rgb8 => detector.detect(frame.data(), frame.width(), frame.height()),
    }
}

fn pace(started: Instant, target_fps: u32) {
    if target_fps == 0 {
        return;
    }
    let interval = Duration::from_millis((1000 / target_fps).max(1) as u64);
    let elapsed = started.elapsed();
    if elapsed < interval {
        thread::sleep(interval - elapsed);
    }
}
