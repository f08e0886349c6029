//! Streams an upstream HTTP body back to the client as a chunked response.
//!
//! The body length is not known up front, so it goes out with
//! `Transfer-Encoding: chunked`; a SHA-256 of the body and its byte count
//! follow as trailers once the upstream hits end-of-stream.

use std::time::Duration;

use anyhow::{Context, Result};
use bytes::BytesMut;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::http::error::HeaderError;
use crate::http::headers::Headers;
use crate::http::response::{default_headers, StatusCode};
use crate::http::writer::ResponseWriter;

/// Default buffer size for streaming
const BUFFER_SIZE: usize = 8192;
/// Give up on upstream heads larger than this
const MAX_HEAD_SIZE: usize = 64 * 1024;

pub const SHA256_TRAILER: &str = "X-Content-SHA256";
pub const LENGTH_TRAILER: &str = "X-Content-Length";

/// What was relayed, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub upstream_status: u16,
    pub bytes: usize,
    pub sha256: String,
}

/// A plain-HTTP upstream that resources are fetched from.
#[derive(Debug, Clone)]
pub struct Upstream {
    base: Url,
    connect_timeout: Duration,
}

impl Upstream {
    pub fn new(base: &str, connect_timeout: Duration) -> Result<Self> {
        let base = Url::parse(base).context("Invalid upstream URL")?;
        if base.scheme() != "http" {
            anyhow::bail!("unsupported upstream scheme: {}", base.scheme());
        }
        base.host_str().context("Upstream URL missing host")?;

        Ok(Self {
            base,
            connect_timeout,
        })
    }

    /// `<base>/<resource>`
    pub fn resource_url(&self, resource: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            resource.trim_start_matches('/')
        );
        Url::parse(&joined).with_context(|| format!("invalid upstream resource {resource:?}"))
    }

    /// Request bytes sent upstream.
    ///
    /// Uses HTTP/1.0 so the upstream answers with a close-delimited body
    /// rather than its own chunked framing.
    pub fn build_request(&self, url: &Url) -> Result<Vec<u8>> {
        let host = url.host_str().context("Upstream URL missing host")?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        Ok(format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nConnection: close\r\nUser-Agent: wirehttp\r\n\r\n",
            target, host
        )
        .into_bytes())
    }

    /// Fetches `resource` and relays it through `writer` as a chunked
    /// response with checksum trailers.
    ///
    /// Nothing is written to `writer` until the upstream head has been read,
    /// so on an early error the caller can still send its own response.
    pub async fn stream_to<W>(
        &self,
        resource: &str,
        writer: &mut ResponseWriter<W>,
    ) -> Result<StreamSummary>
    where
        W: AsyncWrite + Unpin,
    {
        let url = self.resource_url(resource)?;
        let addr = format!(
            "{}:{}",
            url.host_str().context("Upstream URL missing host")?,
            url.port_or_known_default().unwrap_or(80)
        );

        let mut stream = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to upstream")?;
        tracing::trace!(upstream = %url, "Connected to upstream");

        stream.write_all(&self.build_request(&url)?).await?;
        stream.flush().await?;

        let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
        let upstream_status = read_head(&mut stream, &mut buffer).await?;
        let status = StatusCode::from_u16(upstream_status).unwrap_or(StatusCode::BadGateway);

        tracing::debug!(
            upstream = %url,
            upstream_status,
            "Streaming upstream body"
        );

        writer.write_status_line(status).await?;
        writer.write_headers(&chunked_headers()?).await?;

        let mut hasher = Sha256::new();
        let mut total = 0;

        // whatever arrived along with the head is the start of the body
        loop {
            if !buffer.is_empty() {
                hasher.update(&buffer);
                total += buffer.len();
                writer.write_chunked_body(&buffer).await?;
                buffer.clear();
            }

            let n = stream.read_buf(&mut buffer).await?;
            if n == 0 {
                break;
            }
        }

        writer.write_chunked_body_done().await?;

        let sha256 = format!("{:x}", hasher.finalize());
        let mut trailers = Headers::new();
        trailers.set(SHA256_TRAILER, &sha256)?;
        trailers.set(LENGTH_TRAILER, &total.to_string())?;
        writer.write_trailers(&trailers).await?;

        Ok(StreamSummary {
            upstream_status,
            bytes: total,
            sha256,
        })
    }
}

/// Default headers switched over to chunked framing with both trailers declared.
pub fn chunked_headers() -> Result<Headers, HeaderError> {
    let mut headers = default_headers(0);
    headers.override_value("Transfer-Encoding", "chunked")?;
    headers.set("Trailer", SHA256_TRAILER)?;
    headers.set("Trailer", LENGTH_TRAILER)?;
    headers.remove("Content-Length");
    Ok(headers)
}

/// Reads until the end of the upstream head, leaving any body bytes that
/// came with it in `buffer`. Returns the upstream status code.
async fn read_head(stream: &mut TcpStream, buffer: &mut BytesMut) -> Result<u16> {
    loop {
        if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = buffer.split_to(end + 4);
            return parse_status_code(&head);
        }

        if buffer.len() > MAX_HEAD_SIZE {
            anyhow::bail!("Upstream response head too large");
        }

        let n = stream.read_buf(buffer).await?;
        if n == 0 {
            anyhow::bail!("Connection closed before upstream head received");
        }
    }
}

fn parse_status_code(head: &[u8]) -> Result<u16> {
    let head = std::str::from_utf8(head).context("Invalid UTF-8 in upstream head")?;
    let status_line = head.lines().next().context("Empty upstream response")?;

    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        anyhow::bail!("Invalid status line: {}", status_line);
    }

    parts
        .next()
        .context("Status line missing code")?
        .parse()
        .context("Invalid status code")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_from_head() {
        assert_eq!(parse_status_code(b"HTTP/1.1 404 Not Found\r\n\r\n").unwrap(), 404);
        assert_eq!(parse_status_code(b"HTTP/1.0 200\r\n\r\n").unwrap(), 200);
        assert!(parse_status_code(b"SSH-2.0-OpenSSH\r\n\r\n").is_err());
    }

    #[test]
    fn chunked_headers_drop_content_length() {
        let headers = chunked_headers().unwrap();

        assert!(!headers.contains("content-length"));
        assert_eq!(headers.get("transfer-encoding"), Some("chunked"));
        assert_eq!(headers.get("trailer"), Some("X-Content-SHA256, X-Content-Length"));
    }

    #[test]
    fn rejects_https_upstream() {
        assert!(Upstream::new("https://httpbin.org", Duration::from_secs(1)).is_err());
    }
}
