//! kioskd - barcode kiosk daemon
//!
//! This daemon:
//! 1. Opens the configured camera once at startup
//! 2. Runs the capture/detect/overlay/encode loop while viewers are attached
//! 3. Serves the kiosk HTTP surface (live stream, pages, badge upload)
//! 4. Shuts the pipeline and server down cleanly on Ctrl-C

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use tag_kiosk::{
    detector_from_name, Camera, CameraConfig, Config, FrameHub, KioskServer, Publisher,
    PublisherConfig, ServerConfig, ServerState,
};

#[derive(Parser, Debug)]
#[command(name = "kioskd", about = "Barcode kiosk daemon")]
struct Args {
    /// Path to the TOML config file (defaults to KIOSK_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address override (host:port).
    #[arg(long)]
    listen: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        cfg.listen_addr = listen;
    }

    let camera_cfg = CameraConfig {
        device: cfg.camera.device.clone(),
        target_fps: cfg.camera.target_fps,
        width: cfg.camera.width,
        height: cfg.camera.height,
        capture_timeout: cfg.camera.capture_timeout,
    };
    let mut camera = Camera::new(camera_cfg)?;
    camera.connect().context("open camera")?;

    let detector = detector_from_name(&cfg.detector)?;
    log::info!(
        "kioskd starting: camera={} detector={} ap={}",
        cfg.camera.device,
        cfg.detector,
        cfg.ap_ip
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            log::info!("shutdown requested");
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("install signal handler")?;
    }

    let hub = FrameHub::new();
    let publisher = Publisher::spawn(
        camera,
        detector,
        hub.clone(),
        PublisherConfig {
            target_fps: cfg.camera.target_fps,
            jpeg_quality: cfg.jpeg_quality,
            ..PublisherConfig::default()
        },
        shutdown.clone(),
    )?;

    let server = KioskServer::new(
        ServerConfig {
            addr: cfg.listen_addr.clone(),
        },
        ServerState {
            hub,
            badge: cfg.badge.clone(),
            ap_ip: cfg.ap_ip.clone(),
        },
    )
    .spawn(shutdown.clone())?;
    log::info!("kiosk listening on http://{}", server.addr);
    log::info!("live stream at http://{}/video_feed", server.addr);

    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    server.stop()?;
    publisher.stop()?;
    log::info!("kioskd stopped");
    Ok(())
}
