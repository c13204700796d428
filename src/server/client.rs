//! The HTTP fan-out client collaborator: a minimal request-line/header parser
//! with CRLF framing and LWS folding, plus the per-client outbound queue.
//!
//! Grounded on the original `streamclient.cpp`/the `http/` request parser
//! described alongside `streamserver.cpp`: `RequestLine -> Header -> Body ->
//! Ready` states, GET/HEAD only, a request byte cap, and queued response
//! bytes drained against socket writability. The async/await read loop below
//! replaces the original's readiness-callback state machine; `tokio::net`
//! gives the same non-blocking behavior without hand-rolled polling.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;

use crate::error::{Result, TsError};
use crate::ts::writer::FramedWriter;

/// Default per-request byte cap before a request is rejected as oversize.
pub const DEFAULT_REQUEST_CAP: usize = 10 * 1024;

/// A parsed, accepted HTTP request line.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// `GET` or `HEAD`.
    pub method: String,
    /// Request target, unparsed.
    pub path: String,
    /// `HTTP/1.0` or `HTTP/1.1`.
    pub version: String,
}

impl HttpRequest {
    /// Whether this request expects a response body (GET does, HEAD does not).
    pub fn wants_body(&self) -> bool {
        self.method == "GET"
    }
}

/// Reads one HTTP request-line and header block off `stream`, up to the
/// blank line that ends it, enforcing `request_cap` bytes of buffered input.
/// Only `GET`/`HEAD` and `HTTP/1.0`/`HTTP/1.1` are accepted; anything else is
/// a protocol error the caller should answer with `400 Bad Request`.
pub async fn read_request(stream: &mut TcpStream, request_cap: usize) -> Result<HttpRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        if let Some(header_end) = find_header_end(&buf) {
            let header_text = String::from_utf8_lossy(&buf[..header_end]).into_owned();
            return parse_request_line(&header_text);
        }
        if buf.len() > request_cap {
            return Err(TsError::Http("request exceeds configured byte cap".to_string()));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(TsError::Http(
                "connection closed before request completed".to_string(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

/// Un-folds continuation lines (leading space/tab) into their preceding
/// field, per the CRLF + linear-whitespace folding rule.
fn unfold_lws(lines: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in lines {
        if (line.starts_with(' ') || line.starts_with('\t')) && !out.is_empty() {
            let folded = format!("{} {}", out.pop().unwrap(), line.trim());
            out.push(folded);
        } else {
            out.push((*line).to_string());
        }
    }
    out
}

fn parse_request_line(header_text: &str) -> Result<HttpRequest> {
    let raw_lines: Vec<&str> = header_text
        .split("\r\n")
        .filter(|l| !l.is_empty())
        .collect();
    let lines = unfold_lws(&raw_lines);
    let request_line = lines
        .first()
        .ok_or_else(|| TsError::Http("empty request".to_string()))?;

    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| TsError::Http("missing method".to_string()))?
        .to_string();
    let path = parts
        .next()
        .ok_or_else(|| TsError::Http("missing request target".to_string()))?
        .to_string();
    let version = parts
        .next()
        .ok_or_else(|| TsError::Http("missing HTTP version".to_string()))?
        .to_string();

    if method != "GET" && method != "HEAD" {
        return Err(TsError::Http(format!("unsupported method: {method}")));
    }
    if version != "HTTP/1.0" && version != "HTTP/1.1" {
        return Err(TsError::Http(format!("unsupported version: {version}")));
    }

    Ok(HttpRequest {
        method,
        path,
        version,
    })
}

/// A connected client past the HTTP handshake, holding its outbound queue.
pub struct Client {
    /// Peer address, kept for logging.
    pub addr: SocketAddr,
    writer: FramedWriter<OwnedWriteHalf>,
}

impl Client {
    /// Wraps the write half of an accepted, request-parsed connection.
    pub fn new(write_half: OwnedWriteHalf, addr: SocketAddr) -> Self {
        Self {
            addr,
            writer: FramedWriter::new(write_half),
        }
    }

    /// Sends the fixed response header ahead of any queued packet bytes.
    pub async fn send_response_header(&mut self) -> Result<()> {
        let header =
            "HTTP/1.1 200 OK\r\nContent-Type: video/mp2t\r\nConnection: close\r\n\r\n";
        self.writer.queue_and_flush(header.as_bytes()).await
    }

    /// Sends a `400 Bad Request` and closes, used when request parsing fails.
    pub async fn send_bad_request(&mut self) -> Result<()> {
        let header = "HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n";
        self.writer.queue_and_flush(header.as_bytes()).await
    }

    /// Bytes currently queued but not yet written to the socket.
    pub fn queued_len(&self) -> usize {
        self.writer.queued_len()
    }

    /// Appends packet bytes to this client's outbound queue.
    pub fn enqueue(&mut self, bytes: &[u8]) {
        self.writer.queue(bytes);
    }

    /// Drains as much of the outbound queue as the socket accepts right now.
    pub async fn flush(&mut self) -> Result<usize> {
        self.writer.drain().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfolds_continuation_lines() {
        let lines = ["Host: example.com", " continued", "X-Other: 1"];
        let out = unfold_lws(&lines);
        assert_eq!(out, vec!["Host: example.com continued", "X-Other: 1"]);
    }

    #[test]
    fn parses_get_request_line() {
        let req = parse_request_line("GET /stream.ts HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/stream.ts");
        assert!(req.wants_body());
    }

    #[test]
    fn rejects_post_method() {
        assert!(parse_request_line("POST / HTTP/1.1\r\n\r\n").is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(parse_request_line("GET / HTTP/2.0\r\n\r\n").is_err());
    }
}
