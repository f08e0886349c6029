//! HTTP/1.1 protocol implementation.
//!
//! Everything here works directly on byte streams; there is no HTTP library
//! underneath.
//!
//! # Architecture
//!
//! - **`headers`**: case-insensitive header collection with token validation and value folding
//! - **`request`**: request types and the resumable, byte-at-a-time parse state machine
//! - **`parser`**: read buffer and the driver that pulls bytes from a stream into the state machine
//! - **`response`**: status code table and default response headers
//! - **`writer`**: phase-ordered response writer with chunked bodies and trailers
//! - **`connection`**: one request/response exchange per accepted connection
//! - **`error`**: parse and write error types
//!
//! # Request parse states
//!
//! ```text
//!        ┌─────────────┐
//!        │ Initialized │ ← Waiting for a full request line
//!        └──────┬──────┘
//!               │ METHOD SP TARGET SP HTTP/1.1 CRLF
//!               ▼
//!        ┌──────────────────┐
//!        │  ParsingHeaders  │ ← One header line per step
//!        └──────┬───────────┘
//!               │ blank line
//!               ▼
//!        ┌──────────────────┐
//!        │   ParsingBody    │ ← Waits for Content-Length bytes
//!        └──────┬───────────┘
//!               │ body complete (or no Content-Length)
//!               ▼
//!        ┌──────────────────┐
//!        │       Done       │
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use wirehttp::http::connection::Connection;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:42069").await?;
//!
//!     loop {
//!         let (socket, addr) = listener.accept().await?;
//!         tokio::spawn(async move {
//!             if let Err(e) = Connection::new(socket, addr).run(&MyHandler).await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod error;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;

pub use connection::Handler;
pub use error::{HeaderError, ParseError, WriteError};
pub use headers::Headers;
pub use request::{ParseState, Request, RequestLine};
pub use response::{default_headers, StatusCode};
pub use writer::{ResponseWriter, WriteState};
