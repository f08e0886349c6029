//! Upstream relaying.
//!
//! Fetches a resource from a plain-HTTP upstream and streams it to the client
//! through the chunked response writer, with checksum trailers.

pub mod upstream;

pub use upstream::{StreamSummary, Upstream};
