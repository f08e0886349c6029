use std::collections::HashSet;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::error::WriteError;
use crate::http::headers::Headers;
use crate::http::response::StatusCode;

const HTTP_VERSION: &str = "HTTP/1.1";
const CRLF: &[u8] = b"\r\n";

/// Where a [`ResponseWriter`] is in the message. Only ever moves forward.
///
/// ```text
/// Initial ─► StatusLineWritten ─► HeadersWritten ─┬─► BodyInProgress{chunked: false}
///                                                 └─► BodyInProgress{chunked: true}
///                                                       ─► ChunkedBodyDone ─► TrailersWritten
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Initial,
    StatusLineWritten,
    HeadersWritten,
    BodyInProgress { chunked: bool },
    ChunkedBodyDone,
    TrailersWritten,
}

/// Writes one HTTP/1.1 response onto `W`, refusing out-of-order calls.
///
/// Every method writes straight through to the sink; nothing is buffered
/// between phases.
pub struct ResponseWriter<W> {
    inner: W,
    state: WriteState,
    declared_trailers: HashSet<String>,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            state: WriteState::Initial,
            declared_trailers: HashSet::new(),
        }
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// `HTTP/1.1 <code> <reason>\r\n`
    pub async fn write_status_line(&mut self, status: StatusCode) -> Result<(), WriteError> {
        self.write_status_code(status.as_u16()).await
    }

    /// Like [`write_status_line`](ResponseWriter::write_status_line) for a raw
    /// numeric code; fails with `UnknownStatusCode` when it has no reason phrase.
    pub async fn write_status_code(&mut self, code: u16) -> Result<(), WriteError> {
        self.expect("write_status_line", |s| s == WriteState::Initial)?;

        let status = StatusCode::from_u16(code).ok_or(WriteError::UnknownStatusCode(code))?;
        let line = format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        );

        self.inner.write_all(line.as_bytes()).await?;
        self.state = WriteState::StatusLineWritten;
        Ok(())
    }

    /// Header lines plus the blank line that ends the header block.
    ///
    /// Names listed in a `Trailer` header are remembered so that
    /// [`write_trailers`](ResponseWriter::write_trailers) can check them.
    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), WriteError> {
        self.expect("write_headers", |s| s == WriteState::StatusLineWritten)?;

        self.inner.write_all(&serialize_fields(headers)).await?;

        if let Some(declared) = headers.get("Trailer") {
            self.declared_trailers = declared
                .split(',')
                .map(|name| name.trim().to_ascii_lowercase())
                .filter(|name| !name.is_empty())
                .collect();
        }
        self.state = WriteState::HeadersWritten;
        Ok(())
    }

    /// Raw body bytes for a response framed by `Content-Length`.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, WriteError> {
        self.expect("write_body", |s| {
            matches!(
                s,
                WriteState::HeadersWritten | WriteState::BodyInProgress { chunked: false }
            )
        })?;

        self.inner.write_all(body).await?;
        self.state = WriteState::BodyInProgress { chunked: false };
        Ok(body.len())
    }

    /// One chunk: `<hex len>\r\n<bytes>\r\n`. Each call is its own chunk.
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<usize, WriteError> {
        self.expect("write_chunked_body", |s| {
            matches!(
                s,
                WriteState::HeadersWritten | WriteState::BodyInProgress { chunked: true }
            )
        })?;

        // a zero-length chunk would read as the terminator
        if !chunk.is_empty() {
            let mut frame = Vec::with_capacity(chunk.len() + 12);
            frame.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            frame.extend_from_slice(chunk);
            frame.extend_from_slice(CRLF);
            self.inner.write_all(&frame).await?;
        }

        self.state = WriteState::BodyInProgress { chunked: true };
        Ok(chunk.len())
    }

    /// The terminating `0\r\n` chunk. Trailers (possibly none) follow.
    pub async fn write_chunked_body_done(&mut self) -> Result<(), WriteError> {
        self.expect("write_chunked_body_done", |s| {
            matches!(
                s,
                WriteState::HeadersWritten | WriteState::BodyInProgress { chunked: true }
            )
        })?;

        self.inner.write_all(b"0\r\n").await?;
        self.state = WriteState::ChunkedBodyDone;
        Ok(())
    }

    /// Trailer fields plus the final blank line, completing the message.
    ///
    /// Every field must have been announced in the `Trailer` response header.
    /// An empty collection only writes the final CRLF.
    pub async fn write_trailers(&mut self, trailers: &Headers) -> Result<(), WriteError> {
        self.expect("write_trailers", |s| s == WriteState::ChunkedBodyDone)?;

        if let Some((name, _)) = trailers
            .iter()
            .find(|(name, _)| !self.declared_trailers.contains(*name))
        {
            return Err(WriteError::UndeclaredTrailer(name.to_string()));
        }

        self.inner.write_all(&serialize_fields(trailers)).await?;
        self.state = WriteState::TrailersWritten;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), WriteError> {
        self.inner.flush().await?;
        Ok(())
    }

    fn expect(
        &self,
        operation: &'static str,
        allowed: impl Fn(WriteState) -> bool,
    ) -> Result<(), WriteError> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(WriteError::WriteOrderViolation {
                operation,
                state: self.state,
            })
        }
    }
}

fn serialize_fields(fields: &Headers) -> Vec<u8> {
    let mut buf = Vec::new();
    for (name, value) in fields.iter() {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(CRLF);
    }
    buf.extend_from_slice(CRLF);
    buf
}
