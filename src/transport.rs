//! Access-point upload.
//!
//! One outbound HTTP request: POST the finished badge JPEG to the
//! e-paper access point, addressed by the tag's MAC address. The only
//! logic here is error translation — connectivity failures and AP
//! rejections must read differently to the kiosk user.

use std::fmt;
use std::path::Path;

use url::Url;

/// Upload failure, split by who is at fault.
#[derive(Debug)]
pub enum ApUploadError {
    /// The badge file could not be read back.
    Io(String),
    /// The access point could not be reached at all.
    Connect(String),
    /// The access point answered with a non-success status.
    Rejected { status: u16, message: String },
}

impl fmt::Display for ApUploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApUploadError::Io(detail) => write!(f, "badge file unreadable: {}", detail),
            ApUploadError::Connect(detail) => {
                write!(f, "access point unreachable: {}", detail)
            }
            ApUploadError::Rejected { status, message } => {
                write!(f, "access point rejected the image ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for ApUploadError {}

/// Push the image at `path` to the access point for the tag `mac`.
/// Returns the AP's response body on success.
pub fn upload_image(path: &Path, mac: &str, ap_ip: &str) -> Result<String, ApUploadError> {
    let bytes = std::fs::read(path).map_err(|err| ApUploadError::Io(err.to_string()))?;

    let endpoint = Url::parse(&format!("http://{}/api/image", ap_ip))
        .map_err(|err| ApUploadError::Connect(format!("invalid access point address: {}", err)))?;

    let response = ureq::post(endpoint.as_str())
        .query("mac", mac)
        .set("Content-Type", "image/jpeg")
        .send_bytes(&bytes);

    match response {
        Ok(response) => response
            .into_string()
            .map(|body| body.trim().to_string())
            .map_err(|err| ApUploadError::Connect(format!("read response: {}", err))),
        Err(ureq::Error::Status(status, response)) => {
            let message = response
                .into_string()
                .unwrap_or_default()
                .trim()
                .to_string();
            Err(ApUploadError::Rejected { status, message })
        }
        Err(ureq::Error::Transport(transport)) => {
            Err(ApUploadError::Connect(transport.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Minimal one-shot AP: accepts a single request, checks the request
    /// line, answers with the given status and body.
    fn spawn_stub_ap(status_line: &'static str, body: &'static str) -> (String, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let join = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let mut request = Vec::new();
            loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") || n == 0 {
                    break;
                }
            }
            let reply = format!(
                "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (addr, join)
    }

    fn badge_file(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("badge.jpg");
        std::fs::write(&path, b"\xFF\xD8fakejpeg\xFF\xD9").unwrap();
        path
    }

    #[test]
    fn upload_returns_ap_reply_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = badge_file(dir.path());
        let (addr, join) = spawn_stub_ap("HTTP/1.1 200 OK", "image accepted\n");

        let reply = upload_image(&path, "AA:BB:CC:DD:EE:FF", &addr).unwrap();
        assert_eq!(reply, "image accepted");

        let request = join.join().unwrap();
        assert!(request.starts_with("POST /api/image?mac=AA"));
        assert!(request.contains("Content-Type: image/jpeg"));
    }

    #[test]
    fn rejection_carries_the_ap_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = badge_file(dir.path());
        let (addr, _join) = spawn_stub_ap("HTTP/1.1 422 Unprocessable Entity", "wrong size");

        let err = upload_image(&path, "AA:BB:CC:DD:EE:FF", &addr).unwrap_err();
        match err {
            ApUploadError::Rejected { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "wrong size");
            }
            other => panic!("expected rejection, got {}", other),
        }
    }

    #[test]
    fn unreachable_ap_is_a_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = badge_file(dir.path());

        // Reserved port with nothing listening.
        let err = upload_image(&path, "AA:BB:CC:DD:EE:FF", "127.0.0.1:9").unwrap_err();
        assert!(matches!(err, ApUploadError::Connect(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err =
            upload_image(Path::new("/nonexistent/badge.jpg"), "AA:BB", "127.0.0.1:9").unwrap_err();
        assert!(matches!(err, ApUploadError::Io(_)));
    }
}
