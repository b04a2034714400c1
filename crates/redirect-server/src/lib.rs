//! Redirect server library.
//!
//! Exposes the server implementation for the standalone binary and for
//! integration tests.

pub mod cli;
pub mod config;
mod error;
pub mod handshake;
pub mod listener;

pub use error::{HandshakeError, ServerError};
pub use tokio_util::sync::CancellationToken;
