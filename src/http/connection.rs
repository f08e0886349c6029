use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::http::parser::parse_from_stream;
use crate::http::request::Request;
use crate::http::response::{default_headers, StatusCode};
use crate::http::writer::ResponseWriter;

/// Application callback, invoked once per successfully parsed request.
///
/// The handler owns the whole response: it must drive the writer from the
/// status line onwards. The connection is closed once the returned future
/// resolves, whether or not it succeeded.
pub trait Handler: Send + Sync + 'static {
    fn handle<W>(
        &self,
        writer: &mut ResponseWriter<W>,
        request: &Request,
    ) -> impl Future<Output = anyhow::Result<()>> + Send
    where
        W: AsyncWrite + Unpin + Send;
}

/// One accepted transport connection carrying exactly one request/response.
pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    /// Parses the request, hands it to `handler` and closes the stream.
    ///
    /// A request that fails to parse gets a `400` carrying the error text.
    /// Transport errors while reading abort without a response.
    pub async fn run<H: Handler>(mut self, handler: &H) -> anyhow::Result<()> {
        let result = self.exchange(handler).await;

        // close on every path; the peer may already be gone
        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!(peer = %self.peer, error = %e, "shutdown after response failed");
        }

        result
    }

    async fn exchange<H: Handler>(&mut self, handler: &H) -> anyhow::Result<()> {
        let parsed = parse_from_stream(&mut self.stream).await;
        let mut writer = ResponseWriter::new(&mut self.stream);

        let request = match parsed {
            Ok(request) => request,
            Err(e) if e.is_transport() => {
                return Err(e).context("failed reading request");
            }
            Err(e) => {
                tracing::warn!(peer = %self.peer, error = %e, "rejecting malformed request");
                let body = format!("Error parsing request: {e}");
                writer.write_status_line(StatusCode::BadRequest).await?;
                writer.write_headers(&default_headers(body.len())).await?;
                writer.write_body(body.as_bytes()).await?;
                return Ok(());
            }
        };

        tracing::info!(
            peer = %self.peer,
            method = %request.method(),
            target = %request.target(),
            "request received"
        );

        handler
            .handle(&mut writer, &request)
            .await
            .context("handler failed")?;
        writer.flush().await?;

        Ok(())
    }
}
