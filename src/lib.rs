//! Tag Kiosk
//!
//! This crate implements a barcode kiosk: a camera-to-browser pipeline
//! plus the badge tools around it.
//!
//! # Architecture
//!
//! One publisher thread owns the camera and repeatedly runs
//! capture -> detect -> overlay -> encode, fanning each encoded frame out
//! to every connected viewer; the HTTP server turns `GET /video_feed`
//! connections into multipart MJPEG streams fed from that fan-out. A slow
//! or dead viewer never blocks capture or the other viewers.
//!
//! Capture failures end the current streams and are retried when the next
//! viewer arrives; detection and encoding are best-effort per frame.
//!
//! # Module Structure
//!
//! - `capture`: camera ownership and the blocking `capture()` call
//! - `detect`: barcode detector backends (QR is the deployment backend)
//! - `overlay`: pure annotation of detection results onto frame copies
//! - `encode`: JPEG compression at fixed quality
//! - `stream`: publisher loop, fan-out hub, multipart wire framing
//! - `server`: hand-rolled HTTP surface (stream, pages, badge upload)
//! - `badge` / `transport`: badge composition and access-point upload
//! - `config`: TOML file + environment configuration

pub mod badge;
pub mod capture;
pub mod config;
pub mod detect;
pub mod encode;
pub mod frame;
mod glyph;
pub mod overlay;
pub mod server;
pub mod stream;
pub mod transport;

pub use badge::BadgeFields;
pub use capture::{Camera, CameraConfig, CaptureError, FrameSource};
pub use config::{BadgeSettings, CameraSettings, Config};
pub use detect::{detector_from_name, Detection, Detector, DetectorInput, Point, QrDetector, StubDetector};
pub use encode::{encode_jpeg, EncodeError, DEFAULT_JPEG_QUALITY};
pub use frame::Frame;
pub use server::{KioskServer, ServerConfig, ServerHandle, ServerState};
pub use stream::{EncodedFrame, FrameHub, Publisher, PublisherConfig, Subscription};
pub use transport::ApUploadError;
