//! Kiosk HTTP server.
//!
//! Hand-rolled HTTP/1.1 over `TcpListener`: a non-blocking accept loop with
//! a shutdown flag, one handler thread per connection. Most routes answer
//! and close; `/video_feed` turns its connection into an unbounded
//! multipart stream fed from the frame hub.
//!
//! Once a stream has started nothing is reported to the viewer as an HTTP
//! error; the multipart sequence simply ends.

mod pages;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::json;

use crate::badge::{self, BadgeFields};
use crate::config::BadgeSettings;
use crate::stream::{write_chunk, FrameHub};
use crate::transport::{self, ApUploadError};

const MAX_HEAD_BYTES: usize = 8192;
const MAX_BODY_BYTES: usize = 64 * 1024;
/// A viewer that cannot take a chunk for this long is treated as gone.
const VIEWER_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Everything request handlers need, shared across connection threads.
pub struct ServerState {
    pub hub: FrameHub,
    pub badge: BadgeSettings,
    pub ap_ip: String,
}

#[derive(Debug)]
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("http server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct KioskServer {
    cfg: ServerConfig,
    state: Arc<ServerState>,
}

impl KioskServer {
    pub fn new(cfg: ServerConfig, state: ServerState) -> Self {
        Self {
            cfg,
            state: Arc::new(state),
        }
    }

    pub fn spawn(self, shutdown: Arc<AtomicBool>) -> Result<ServerHandle> {
        let listener = TcpListener::bind(&self.cfg.addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let state = self.state;
        let accept_shutdown = shutdown.clone();
        let join = std::thread::Builder::new()
            .name("kiosk-http".into())
            .spawn(move || {
                if let Err(err) = run_accept_loop(listener, state, accept_shutdown) {
                    log::error!("http server stopped: {}", err);
                }
            })?;

        Ok(ServerHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                let state = state.clone();
                std::thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &state) {
                        log::warn!("request from {} failed: {}", peer, err);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, state: &ServerState) -> Result<()> {
    let request = read_request(&mut stream)?;

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/video_feed") => stream_video(stream, &state.hub),
        ("GET", "/") => write_response(
            &mut stream,
            200,
            "text/html; charset=utf-8",
            pages::INDEX_HTML.as_bytes(),
        ),
        ("GET", "/barcode.html") => write_response(
            &mut stream,
            200,
            "text/html; charset=utf-8",
            pages::BARCODE_HTML.as_bytes(),
        ),
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("POST", "/upload") => handle_upload(&mut stream, state, &request),
        ("GET", "/upload") | ("POST", "/video_feed") | ("POST", "/") => {
            write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)
        }
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

/// Serve the multipart stream until the viewer leaves or the publisher
/// drains. Write failures and timeouts are this viewer's disconnect, never
/// a server error.
fn stream_video(mut stream: TcpStream, hub: &FrameHub) -> Result<()> {
    stream.set_write_timeout(Some(VIEWER_WRITE_TIMEOUT))?;
    stream.write_all(
        b"HTTP/1.1 200 OK\r\n\
          Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
          Cache-Control: no-store\r\n\
          Connection: close\r\n\r\n",
    )?;

    let subscription = hub.subscribe();
    loop {
        let Some(frame) = subscription.recv() else {
            log::debug!("video feed ended: stream drained");
            break;
        };
        if let Err(err) = write_chunk(&mut stream, &frame.jpeg) {
            log::debug!("viewer disconnected: {}", err);
            break;
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    mac_address: String,
    #[serde(flatten)]
    fields: BadgeFields,
}

/// Generate a badge from the posted fields and push it to the access
/// point. Upload failures are translated into the reply message, not an
/// HTTP error status.
fn handle_upload(stream: &mut TcpStream, state: &ServerState, request: &HttpRequest) -> Result<()> {
    let upload: UploadRequest = match serde_json::from_slice(&request.body) {
        Ok(upload) => upload,
        Err(err) => {
            let body = json!({ "error": format!("invalid upload body: {}", err) });
            return write_json_response(stream, 400, &body.to_string());
        }
    };

    let file_path = match badge::compose(&upload.fields, &state.badge) {
        Ok(path) => path,
        Err(err) => {
            log::error!("badge generation failed: {}", err);
            let body = json!({ "error": format!("badge generation failed: {}", err) });
            return write_json_response(stream, 500, &body.to_string());
        }
    };
    let file_name = file_path.display().to_string();

    let message = match transport::upload_image(&file_path, &upload.mac_address, &state.ap_ip) {
        Ok(reply) => {
            log::info!(
                "badge {} uploaded for {} via {}",
                file_name,
                upload.mac_address,
                state.ap_ip
            );
            reply
        }
        Err(ApUploadError::Connect(detail)) => {
            log::warn!("access point unreachable: {}", detail);
            format!("Could not connect to the access point at {}.", state.ap_ip)
        }
        Err(err) => {
            log::warn!("access point rejected badge: {}", err);
            err.to_string()
        }
    };

    let body = json!({ "message": message, "file_name": file_name });
    write_json_response(stream, 200, &body.to_string())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let head_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if data.len() > MAX_HEAD_BYTES {
            return Err(anyhow!("request head too large"));
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-request"));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let (method, path, headers) = parse_head(&data[..head_end])?;

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse())
        .transpose()
        .map_err(|_| anyhow!("invalid content-length"))?
        .unwrap_or(0);
    if content_length > MAX_BODY_BYTES {
        return Err(anyhow!("request body too large"));
    }

    let mut body = data[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-body"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    Ok(HttpRequest { method, path, body })
}

fn parse_head(head: &[u8]) -> Result<(String, String, HashMap<String, String>)> {
    let text = String::from_utf8_lossy(head);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok((method.to_string(), path, headers))
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_head_extracts_method_path_and_headers() {
        let head = b"POST /upload?x=1 HTTP/1.1\r\nHost: kiosk\r\nContent-Length: 12";
        let (method, path, headers) = parse_head(head).unwrap();
        assert_eq!(method, "POST");
        assert_eq!(path, "/upload");
        assert_eq!(headers.get("content-length").unwrap(), "12");
        assert_eq!(headers.get("host").unwrap(), "kiosk");
    }

    #[test]
    fn parse_head_rejects_garbage() {
        assert!(parse_head(b"").is_err());
        assert!(parse_head(b"GET").is_err());
    }
}
