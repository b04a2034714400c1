//! Error types for the core crate.

use thiserror::Error;

/// Errors from encoding or decoding a handshake frame.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("payload too long: {0} bytes (max {max})", max = crate::defaults::HANDSHAKE_FRAME_LEN - 1)]
    PayloadTooLong(usize),

    #[error("bad delimiter: 0x{0:02x}")]
    BadDelimiter(u8),

    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors from the channel registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("duplicate channel id: {0}")]
    DuplicateChannel(String),
}
