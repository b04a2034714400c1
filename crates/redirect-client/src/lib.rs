//! Redirect client library.
//!
//! Exposes the local agent implementation for the standalone binary and
//! for integration tests.

pub mod cli;
pub mod config;
mod error;
pub mod handshake;
pub mod listener;

pub use error::{ClientError, HandshakeError};
pub use tokio_util::sync::CancellationToken;
