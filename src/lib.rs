//! wirehttp - HTTP/1.1 straight off the socket
//!
//! Incremental request parsing, phase-ordered response writing and a
//! task-per-connection server, built directly on tokio byte streams.

pub mod app;
pub mod config;
pub mod http;
pub mod proxy;
pub mod server;
