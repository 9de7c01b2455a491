//! Loopback HTTP fixtures shared by this crate's tests and by crates that
//! talk to remote models or generators.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves `body` with `status` to exactly one request and returns
/// `http://<addr><path>`.
pub async fn one_shot_server(status: &'static str, body: &'static str, path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if request_complete(&buf) {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    format!("http://{addr}{path}")
}

/// True once `buf` holds the headers and the full `Content-Length` body.
pub fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    buf.len() >= header_end + 4 + content_length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_waits_for_declared_body() {
        let head = b"POST /x HTTP/1.1\r\nContent-Length: 4\r\n\r\n";
        assert!(!request_complete(&head[..head.len() - 2]));
        assert!(!request_complete(head));
        let mut full = head.to_vec();
        full.extend_from_slice(b"abcd");
        assert!(request_complete(&full));
    }

    #[test]
    fn missing_length_means_no_body() {
        assert!(request_complete(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n"));
    }
}
