//! `RemoveBgClient` against a loopback HTTP responder.
//!
//! Each test binds a one-shot listener on 127.0.0.1, points the client at it
//! and inspects both the raw request and the mapped result.

use edgequake_bgremove::pipeline::remote::server_error_message;
use edgequake_bgremove::{
    BackgroundRemover, ErrorKind, ImageFile, NoProgress, ProcessingError, RemovalConfig,
    RemoveBgClient, UploadProgress,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const PAYLOAD: &[u8] = b"\xFF\xD8\xFF\xE0JPEG-PAYLOAD-MARKER";

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Canned {
    status: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

/// Accept one connection, read the full request, answer with `reply`.
/// The handle resolves to the raw request bytes.
async fn serve_once(reply: Canned) -> (String, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1.0/removebg", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            reply.status,
            reply.content_type,
            reply.body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(&reply.body).await.unwrap();
        stream.shutdown().await.ok();
        request
    });
    (url, handle)
}

async fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if request_complete(&buf) {
            break;
        }
    }
    buf
}

fn request_complete(buf: &[u8]) -> bool {
    let Some(head_end) = find(buf, b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok());
    match content_length {
        Some(len) => buf.len() >= head_end + 4 + len,
        None => buf.ends_with(b"0\r\n\r\n"),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn client_for(url: &str) -> RemoveBgClient {
    let config = RemovalConfig::builder()
        .api_key("test-key-123")
        .endpoint(url)
        .build()
        .unwrap();
    RemoveBgClient::new(&config).unwrap()
}

fn photo() -> ImageFile {
    ImageFile::new("cat.jpg", "image/jpeg", PAYLOAD.to_vec())
}

#[derive(Default)]
struct CountingProgress(AtomicUsize);

impl UploadProgress for CountingProgress {
    fn on_request_sent(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Request shape ────────────────────────────────────────────────────────────

#[tokio::test]
async fn sends_multipart_with_key_and_size() {
    let (url, server) = serve_once(Canned {
        status: "200 OK",
        content_type: "image/png",
        body: b"\x89PNG-cutout".to_vec(),
    })
    .await;

    let client = client_for(&url);
    client.submit(&photo(), &NoProgress).await.unwrap();

    let raw = server.await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    let lower = text.to_ascii_lowercase();
    assert!(lower.starts_with("post /v1.0/removebg http/1.1"));
    assert!(lower.contains("x-api-key: test-key-123"));
    assert!(lower.contains("content-type: multipart/form-data; boundary="));
    assert!(text.contains(r#"name="image_file"; filename="cat.jpg""#));
    assert!(text.contains("image/jpeg"));
    assert!(text.contains(r#"name="size""#));
    assert!(text.contains("\r\n\r\nauto\r\n"));
    assert!(find(&raw, PAYLOAD).is_some(), "file bytes missing from body");
}

// ── Responses ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn success_returns_body_and_mime() {
    let (url, server) = serve_once(Canned {
        status: "200 OK",
        content_type: "image/png; charset=binary",
        body: b"\x89PNG-cutout".to_vec(),
    })
    .await;

    let progress = CountingProgress::default();
    let data = client_for(&url).submit(&photo(), &progress).await.unwrap();
    server.await.unwrap();

    assert_eq!(&data.bytes[..], b"\x89PNG-cutout");
    assert_eq!(data.mime_type, "image/png");
    assert_eq!(progress.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_image_content_type_defaults_to_png() {
    let (url, server) = serve_once(Canned {
        status: "200 OK",
        content_type: "application/octet-stream",
        body: vec![1, 2, 3],
    })
    .await;

    let data = client_for(&url).submit(&photo(), &NoProgress).await.unwrap();
    server.await.unwrap();
    assert_eq!(data.mime_type, "image/png");
}

#[tokio::test]
async fn error_title_is_surfaced_verbatim() {
    let (url, server) = serve_once(Canned {
        status: "402 Payment Required",
        content_type: "application/json",
        body: br#"{"errors":[{"title":"Insufficient credits","code":"insufficient_credits"}]}"#
            .to_vec(),
    })
    .await;

    let progress = CountingProgress::default();
    let err = client_for(&url).submit(&photo(), &progress).await.unwrap_err();
    server.await.unwrap();

    assert_eq!(err.kind(), ErrorKind::ServerError);
    assert!(matches!(
        &err,
        ProcessingError::Server { status: 402, message } if message == "Insufficient credits"
    ));
    // The request was delivered even though processing failed.
    assert_eq!(progress.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_error_body_synthesises_message() {
    let (url, server) = serve_once(Canned {
        status: "500 Internal Server Error",
        content_type: "text/plain",
        body: Vec::new(),
    })
    .await;

    let err = client_for(&url).submit(&photo(), &NoProgress).await.unwrap_err();
    server.await.unwrap();
    assert_eq!(err.to_string(), "API Error: 500");
    assert_eq!(server_error_message(500, b"<html>oops</html>"), "API Error: 500");
}

// ── Transport and configuration failures ─────────────────────────────────────

#[tokio::test]
async fn refused_connection_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1.0/removebg", listener.local_addr().unwrap());
    drop(listener);

    let progress = CountingProgress::default();
    let err = client_for(&url).submit(&photo(), &progress).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkError);
    assert!(err.kind().is_retryable());
    assert_eq!(progress.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1.0/removebg", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let config = RemovalConfig::builder()
        .api_key("k")
        .endpoint(&url)
        .api_timeout_secs(1)
        .build()
        .unwrap();
    let err = RemoveBgClient::new(&config)
        .unwrap()
        .submit(&photo(), &NoProgress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkError);
    assert!(err.to_string().contains("timed out after 1s"));
    server.abort();
}

#[tokio::test]
async fn missing_key_never_connects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1.0/removebg", listener.local_addr().unwrap());

    let config = RemovalConfig::builder().endpoint(&url).build().unwrap();
    let err = RemoveBgClient::new(&config)
        .unwrap()
        .submit(&photo(), &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessingError::Configuration));

    let accepted = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(accepted.is_err(), "client connected without an API key");
}
