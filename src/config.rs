//! Daemon configuration.
//!
//! Settings come from an optional TOML file (`--config` flag or the
//! `KIOSK_CONFIG` environment variable) with `KIOSK_*` environment
//! variables layered on top, then validation. The access-point address has
//! no sensible default and must be provided by one of the two.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::encode::DEFAULT_JPEG_QUALITY;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CAMERA_DEVICE: &str = "stub://camera";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DETECTOR: &str = "qr";
const DEFAULT_TEMPLATE_PATH: &str = "static/image_templates/badge.png";
const DEFAULT_OUTPUT_DIR: &str = "static/user";

#[derive(Debug, Deserialize, Default)]
struct KioskConfigFile {
    listen_addr: Option<String>,
    camera: Option<CameraConfigFile>,
    stream: Option<StreamConfigFile>,
    detector: Option<DetectorConfigFile>,
    badge: Option<BadgeConfigFile>,
    ap: Option<ApConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    capture_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct BadgeConfigFile {
    template_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ApConfigFile {
    ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub camera: CameraSettings,
    pub jpeg_quality: u8,
    pub detector: String,
    pub badge: BadgeSettings,
    pub ap_ip: String,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    pub capture_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BadgeSettings {
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
}

impl Config {
    /// Load configuration: file (explicit path or `KIOSK_CONFIG`), then
    /// environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("KIOSK_CONFIG").ok().map(PathBuf::from));
        let file_cfg = match &config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: KioskConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let stream = file.stream.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let badge = file.badge.unwrap_or_default();
        Self {
            listen_addr: file
                .listen_addr
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            camera: CameraSettings {
                device: camera
                    .device
                    .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
                target_fps: camera.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                width: camera.width.unwrap_or(DEFAULT_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_HEIGHT),
                capture_timeout: Duration::from_millis(
                    camera.capture_timeout_ms.unwrap_or(DEFAULT_CAPTURE_TIMEOUT_MS),
                ),
            },
            jpeg_quality: stream.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            detector: detector
                .backend
                .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
            badge: BadgeSettings {
                template_path: badge
                    .template_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_PATH)),
                output_dir: badge
                    .output_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            },
            ap_ip: file.ap.and_then(|ap| ap.ip).unwrap_or_default(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("KIOSK_LISTEN_ADDR") {
            if !addr.trim().is_empty() {
                self.listen_addr = addr;
            }
        }
        if let Ok(device) = std::env::var("KIOSK_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(fps) = std::env::var("KIOSK_TARGET_FPS") {
            self.camera.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("KIOSK_TARGET_FPS must be an integer"))?;
        }
        if let Ok(quality) = std::env::var("KIOSK_JPEG_QUALITY") {
            self.jpeg_quality = quality
                .parse()
                .map_err(|_| anyhow!("KIOSK_JPEG_QUALITY must be an integer 1..=100"))?;
        }
        if let Ok(backend) = std::env::var("KIOSK_DETECTOR") {
            if !backend.trim().is_empty() {
                self.detector = backend;
            }
        }
        if let Ok(path) = std::env::var("KIOSK_BADGE_TEMPLATE") {
            if !path.trim().is_empty() {
                self.badge.template_path = PathBuf::from(path);
            }
        }
        if let Ok(dir) = std::env::var("KIOSK_BADGE_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.badge.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(ip) = std::env::var("KIOSK_AP_IP") {
            if !ip.trim().is_empty() {
                self.ap_ip = ip;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.ap_ip.trim().is_empty() {
            return Err(anyhow!(
                "ap.ip must be set in the config file or KIOSK_AP_IP environment variable"
            ));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow!("stream.jpeg_quality must be within 1..=100"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be non-zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<KioskConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
