use thiserror::Error;

use crate::http::request::ParseState;
use crate::http::writer::WriteState;

/// Errors produced while parsing a request off the wire.
///
/// The `Display` text is what a client sees in the body of the `400`
/// response, so keep it short and human readable.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request line")]
    MalformedRequestLine,

    #[error("invalid method, must be an upper-case token: {0}")]
    InvalidMethod(String),

    #[error("unsupported http version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid request target: {0:?}")]
    InvalidTargetFormat(String),

    #[error("malformed header line")]
    MalformedHeaderLine,

    #[error("invalid header name: {0:?}")]
    InvalidHeaderName(String),

    #[error("invalid value for header {0:?}")]
    InvalidHeaderValue(String),

    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    #[error("incomplete request, stream ended in state {state:?}")]
    IncompleteRequest { state: ParseState },

    #[error("parser is already done")]
    ParserAlreadyDone,

    #[error("io error while reading request: {0}")]
    Io(#[from] std::io::Error),
}

/// A header name or value that [`Headers`](crate::http::headers::Headers)
/// refuses to store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("invalid header name: {0:?}")]
    InvalidName(String),

    #[error("invalid value for header {name:?}")]
    InvalidValue { name: String },
}

impl From<HeaderError> for ParseError {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::InvalidName(name) => ParseError::InvalidHeaderName(name),
            HeaderError::InvalidValue { name } => ParseError::InvalidHeaderValue(name),
        }
    }
}

/// Errors produced by [`ResponseWriter`](crate::http::writer::ResponseWriter).
///
/// Everything except `Io` is a programmer error in the handler.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("unknown status code: {0}")]
    UnknownStatusCode(u16),

    #[error("{operation} called out of order in state {state:?}")]
    WriteOrderViolation {
        operation: &'static str,
        state: WriteState,
    },

    #[error("trailer {0:?} was not declared in the Trailer header")]
    UndeclaredTrailer(String),

    #[error("io error while writing response: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// True when the failure came from the transport rather than the bytes
    /// the client sent. Transport failures get no `400` response.
    pub fn is_transport(&self) -> bool {
        matches!(self, ParseError::Io(_))
    }
}
