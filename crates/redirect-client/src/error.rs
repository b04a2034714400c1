//! Client error types.

use redirect_core::FrameError;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(String),
}

/// Errors that abort a client-role handshake.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("handshake deadline exceeded")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame: {0}")]
    Frame(#[from] FrameError),
    #[error("bad response delimiter: 0x{0:02x}")]
    BadDelimiter(u8),
}
