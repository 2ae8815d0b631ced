//! One-shot HTTP server for backend tests.
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Client that never routes through a system proxy.
pub fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub fn direct_client_with_timeout(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(timeout)
        .build()
        .unwrap()
}

/// Answers the first request with `status` and `body`, then returns the raw
/// request (lossy UTF-8) from the join handle.
pub async fn serve_once(
    status: u16,
    content_type: &'static str,
    body: String,
) -> (String, JoinHandle<String>) {
    serve_scripted(status, content_type, vec![body.into_bytes()], Duration::ZERO, Duration::ZERO)
        .await
}

/// Like [`serve_once`], but waits `delay` before answering and writes the body
/// as separate `chunks`, pausing `gap` between them.
pub async fn serve_scripted(
    status: u16,
    content_type: &'static str,
    chunks: Vec<Vec<u8>>,
    delay: Duration,
    gap: Duration,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        tokio::time::sleep(delay).await;

        let body_len: usize = chunks.iter().map(Vec::len).sum();
        let head = format!(
            "HTTP/1.1 {status} X\r\ncontent-type: {content_type}\r\ncontent-length: {body_len}\r\nconnection: close\r\n\r\n"
        );
        // The client may already have hung up (timeouts); write errors are ignored.
        if socket.write_all(head.as_bytes()).await.is_ok() {
            for (i, chunk) in chunks.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(gap).await;
                }
                if socket.write_all(chunk).await.is_err() || socket.flush().await.is_err() {
                    break;
                }
            }
        }
        socket.shutdown().await.ok();
        request
    });

    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if request_complete(&buf) {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let headers = text[..header_end].to_ascii_lowercase();
    let body_len = buf.len() - (header_end + 4);

    if let Some(len) = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        return body_len >= len;
    }
    if headers.contains("transfer-encoding: chunked") {
        return text.ends_with("0\r\n\r\n");
    }
    true
}
