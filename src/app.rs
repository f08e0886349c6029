//! Demo application served by the binary.
//!
//! A single [`Handler`] that picks a canned page by request target and
//! relays `/httpbin/<rest>` to the configured upstream.

use tokio::io::AsyncWrite;

use crate::http::connection::Handler;
use crate::http::request::Request;
use crate::http::response::{default_headers, StatusCode};
use crate::http::writer::{ResponseWriter, WriteState};
use crate::proxy::Upstream;

pub const PROXY_PREFIX: &str = "/httpbin/";

const BAD_REQUEST_PAGE: &str = "<html>
<head>
<title>400 Bad Request</title>
</head>
<body>
<h1>Bad Request</h1>
<p>Your request honestly kinda sucked.</p>
</body>
</html>
";

const INTERNAL_ERROR_PAGE: &str = "<html>
<head>
<title>500 Internal Server Error</title>
</head>
<body>
<h1>Internal Server Error</h1>
<p>Okay, you know what? This one is on me.</p>
</body>
</html>
";

const OK_PAGE: &str = "<html>
<head>
<title>200 OK</title>
</head>
<body>
<h1>Success!</h1>
<p>Your request was an absolute banger.</p>
</body>
</html>
";

pub struct DemoHandler {
    upstream: Upstream,
}

impl DemoHandler {
    pub fn new(upstream: Upstream) -> Self {
        Self { upstream }
    }

    async fn proxy<W>(&self, writer: &mut ResponseWriter<W>, resource: &str) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match self.upstream.stream_to(resource, writer).await {
            Ok(summary) => {
                tracing::debug!(
                    resource,
                    bytes = summary.bytes,
                    sha256 = %summary.sha256,
                    "upstream relayed"
                );
                Ok(())
            }
            // nothing sent yet, so the client can still get a proper 502
            Err(e) if writer.state() == WriteState::Initial => {
                tracing::warn!(resource, error = %e, "upstream unavailable");
                let body = b"502 Bad Gateway\n";
                writer.write_status_line(StatusCode::BadGateway).await?;
                writer.write_headers(&default_headers(body.len())).await?;
                writer.write_body(body).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Handler for DemoHandler {
    async fn handle<W>(&self, writer: &mut ResponseWriter<W>, request: &Request) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let target = request.target();

        if let Some(resource) = target.strip_prefix(PROXY_PREFIX) {
            return self.proxy(writer, resource).await;
        }

        let (status, page) = match target {
            "/yourproblem" => (StatusCode::BadRequest, BAD_REQUEST_PAGE),
            "/myproblem" => (StatusCode::InternalServerError, INTERNAL_ERROR_PAGE),
            _ => (StatusCode::Ok, OK_PAGE),
        };

        write_html(writer, status, page).await
    }
}

async fn write_html<W>(writer: &mut ResponseWriter<W>, status: StatusCode, page: &str) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut headers = default_headers(page.len());
    headers.override_value("Content-Type", "text/html")?;

    writer.write_status_line(status).await?;
    writer.write_headers(&headers).await?;
    writer.write_body(page.as_bytes()).await?;
    Ok(())
}
