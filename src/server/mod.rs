//! TCP listener and per-connection task spawning.

pub mod listener;

pub use listener::{serve, serve_with_limit, ServerHandle};
