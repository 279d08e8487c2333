mod common;

use std::io::{Read, Write};
use std::net::TcpStream;

use cubemap_capture::CaptureKind;
use cubemap_capture::preview::{PreviewConfig, PreviewServer};
use cubemap_capture::StateHandle;

fn request(port: u16, verb: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    write!(stream, "{verb} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

fn request_raw(port: u16, path: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    response
}

fn start_server(state: StateHandle) -> PreviewServer {
    PreviewServer::start(&PreviewConfig::default(), CaptureKind::Single, state).unwrap()
}

#[test]
fn test_index_and_state_endpoints() {
    let state = StateHandle::new();
    let server = start_server(state.clone());
    let port = server.port();

    let index = request(port, "GET", "/");
    assert!(index.starts_with("HTTP/1.1 200 OK"));
    assert!(index.contains("text/html"));
    assert!(index.contains("/live-single.png"));
    assert!(index.contains("Cache-Control: no-store"));

    let api = request(port, "GET", "/api/state");
    assert!(api.starts_with("HTTP/1.1 200 OK"));
    let body = api.split("\r\n\r\n").nth(1).unwrap();
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["running"], false);
    assert_eq!(json["available"], false);
    assert_eq!(json["lastModified"], 0);
}

#[test]
fn test_image_endpoint_404_until_published() {
    let state = StateHandle::new();
    let server = start_server(state.clone());
    let port = server.port();

    let missing = request(port, "GET", "/live-single.png");
    assert!(missing.starts_with("HTTP/1.1 404"));

    publish_for_test(&state, image::RgbaImage::new(4, 4));

    let response = request_raw(port, "/live-single.png");
    let header_end = find_header_end(&response);
    let headers = String::from_utf8_lossy(&response[..header_end]);
    assert!(headers.starts_with("HTTP/1.1 200 OK"));
    assert!(headers.contains("image/png"));
    let body = &response[header_end + 4..];
    let decoded = image::load_from_memory(body).unwrap();
    assert_eq!(decoded.to_rgba8().dimensions(), (4, 4));
}

#[test]
fn test_unknown_path_and_method() {
    let state = StateHandle::new();
    let server = start_server(state);
    let port = server.port();

    let missing = request(port, "GET", "/nope");
    assert!(missing.starts_with("HTTP/1.1 404"));

    let post = request(port, "POST", "/api/state");
    assert!(post.starts_with("HTTP/1.1 405"));
}

#[test]
fn test_shutdown_stops_accepting() {
    let state = StateHandle::new();
    let mut server = start_server(state);
    let port = server.port();
    assert!(request(port, "GET", "/").starts_with("HTTP/1.1 200"));

    server.shutdown();
    assert!(TcpStream::connect(("127.0.0.1", port)).is_err());
}

fn find_header_end(response: &[u8]) -> usize {
    response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no header terminator")
}

fn publish_for_test(state: &StateHandle, image: image::RgbaImage) {
    // Publication goes through the rig in production; tests route an image
    // through a scratch worker to exercise the same path.
    let (events_tx, _events_rx) = crossbeam_channel::unbounded();
    let mut worker = cubemap_capture::worker::EncodeWorker::spawn(state.clone(), events_tx);
    let _ = worker.submit(0, image);
    assert!(common::wait_until(std::time::Duration::from_secs(5), || {
        state.available()
    }));
}
