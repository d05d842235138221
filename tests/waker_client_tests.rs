use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use swing_watch::alert::{AlertParams, AlertSink, WakerClient};
use swing_watch::error::AppError;

fn params() -> AlertParams {
    AlertParams {
        sound_id: 5,
        level: 60,
        repeat: 2,
    }
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Accept one HTTP request, answer with `status_line`, and hand back the raw
/// request text.
async fn serve_once(status_line: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = header_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let content_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_len {
                    break;
                }
            }
        }

        let resp = format!(
            "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        sock.write_all(resp.as_bytes()).await.unwrap();
        let _ = sock.shutdown().await;
        String::from_utf8(buf).unwrap()
    });

    let url = Url::parse(&format!("http://{}/api/schedules", addr)).unwrap();
    (url, task)
}

#[tokio::test]
/// The alert is a POST to /api/schedules carrying the flat parameter object.
async fn posts_flat_params_to_schedules_endpoint() {
    let (url, server) = serve_once("200 OK", "{}").await;
    let client = WakerClient::new(url, Duration::from_secs(5)).unwrap();

    client.send_alert(&params()).await.unwrap();

    let request = server.await.unwrap();
    assert!(
        request.starts_with("POST /api/schedules HTTP/1.1\r\n"),
        "{request}"
    );
    let end = header_end(request.as_bytes()).unwrap();
    let body: serde_json::Value = serde_json::from_str(&request[end + 4..]).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"sound_id": 5, "level": 60, "repeat": 2})
    );
}

#[tokio::test]
/// Non-2xx replies surface as a dispatch error with status and body.
async fn non_success_status_is_dispatch_error() {
    let (url, server) = serve_once("503 Service Unavailable", "busy").await;
    let client = WakerClient::new(url, Duration::from_secs(5)).unwrap();

    let err = client.send_alert(&params()).await.unwrap_err();
    match err {
        AppError::AlertDispatch { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "busy");
        }
        other => panic!("expected AlertDispatch, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
/// A waker that is not listening yields an HTTP error rather than a panic.
async fn unreachable_waker_is_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{}/api/schedules", addr)).unwrap();
    let client = WakerClient::new(url, Duration::from_secs(2)).unwrap();
    let err = client.send_alert(&params()).await.unwrap_err();
    assert!(matches!(err, AppError::Http(_)));
}
