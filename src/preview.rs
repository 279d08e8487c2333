//! # Live Preview Server
//!
//! Minimal HTTP/1.1 endpoint serving the latest published image for one
//! capture kind. A browser polls `/api/state` and refreshes the image tag;
//! everything is served with no-store headers so the poll always sees the
//! newest frame.
//!
//! One server instance per capture kind, each on its own port.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::session::CaptureKind;
use crate::state::StateHandle;

/// Bind settings for one preview server.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub host: String,
    /// Port 0 binds an ephemeral port; read it back with [`PreviewServer::port`].
    pub port: u16,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

/// A running preview server. Shuts down when dropped.
pub struct PreviewServer {
    port: u16,
    host: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl PreviewServer {
    /// Bind and start serving. Returns once the listener is accepting.
    pub fn start(
        config: &PreviewConfig,
        kind: CaptureKind,
        state: StateHandle,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))?;
        let port = listener.local_addr()?.port();
        listener.set_nonblocking(true)?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name(format!("preview-{}", kind))
            .spawn(move || {
                serve(listener, kind, state, shutdown_rx);
            })?;

        tracing::info!(kind = kind.label(), port, "preview server listening");
        Ok(Self {
            port,
            host: config.host.clone(),
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    /// Stop accepting and join the server thread.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PreviewServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(listener: TcpListener, kind: CaptureKind, state: StateHandle, shutdown: mpsc::Receiver<()>) {
    loop {
        match shutdown.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }
        match listener.accept() {
            Ok((stream, _addr)) => {
                if let Err(err) = handle_connection(stream, kind, &state) {
                    tracing::debug!(error = %err, "preview connection error");
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => {
                tracing::warn!(error = %err, "preview accept failed");
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

fn handle_connection(
    stream: TcpStream,
    kind: CaptureKind,
    state: &StateHandle,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;
    stream.set_nonblocking(false)?;

    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    // Drain the remaining headers; nothing in them matters here.
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");
    let mut stream = reader.into_inner();

    if method != "GET" {
        return write_response(&mut stream, "405 Method Not Allowed", "text/plain", b"GET only");
    }

    let image_path = format!("/live-{}.png", kind);
    if path == "/" {
        let body = index_page(kind, &image_path);
        write_response(&mut stream, "200 OK", "text/html; charset=utf-8", body.as_bytes())
    } else if path == "/api/state" {
        let body = serde_json::json!({
            "running": state.running(),
            "available": state.available(),
            "lastModified": state.latest_timestamp_millis(),
        })
        .to_string();
        write_response(&mut stream, "200 OK", "application/json", body.as_bytes())
    } else if path == image_path {
        match state.latest_bytes() {
            Some(bytes) => write_response(&mut stream, "200 OK", "image/png", &bytes),
            None => write_response(&mut stream, "404 Not Found", "text/plain", b"no capture yet"),
        }
    } else {
        write_response(&mut stream, "404 Not Found", "text/plain", b"not found")
    }
}

fn write_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &[u8],
) -> std::io::Result<()> {
    let headers = format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Cache-Control: no-store, no-cache, must-revalidate\r\n\
         Pragma: no-cache\r\n\
         Connection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(headers.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()
}

fn index_page(kind: CaptureKind, image_path: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Live {kind} preview</title>
<style>
  body {{ margin: 0; background: #111; color: #ddd; font-family: sans-serif; }}
  header {{ padding: 8px 12px; font-size: 14px; }}
  img {{ display: block; max-width: 100vw; max-height: calc(100vh - 40px); margin: 0 auto; }}
</style>
</head>
<body>
<header>Live {kind} preview &mdash; <span id="status">waiting</span></header>
<img id="frame" alt="latest {kind} capture">
<script>
let lastModified = 0;
async function poll() {{
  try {{
    const res = await fetch('/api/state');
    const s = await res.json();
    document.getElementById('status').textContent =
      (s.running ? 'running' : 'stopped') + (s.available ? '' : ', no image yet');
    if (s.available && s.lastModified !== lastModified) {{
      lastModified = s.lastModified;
      document.getElementById('frame').src = '{image_path}?t=' + lastModified;
    }}
  }} catch (e) {{
    document.getElementById('status').textContent = 'disconnected';
  }}
}}
setInterval(poll, 500);
poll();
</script>
</body>
</html>
"#
    )
}
