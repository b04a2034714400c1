//! Server error types.

use redirect_core::{FrameError, RegistryError};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors that abort a server-role handshake.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("handshake deadline exceeded")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame: {0}")]
    Frame(#[from] FrameError),
    #[error("invalid channel: {0}")]
    UnknownChannel(String),
}
