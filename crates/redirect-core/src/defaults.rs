//! Default configuration values.
//!
//! Centralized constants for use across all crates.

use std::time::Duration;

// ============================================================================
// Handshake Protocol
// ============================================================================

/// Fixed handshake frame length in bytes, both request and response.
pub const HANDSHAKE_FRAME_LEN: usize = 50;
/// Handshake frame delimiter byte (0x03), placed at the last frame byte.
pub const HANDSHAKE_DELIMITER: u8 = 0x03;
/// Padding byte for unused payload space (ASCII space).
pub const HANDSHAKE_PADDING: u8 = 0x20;
/// Default handshake deadline in seconds, measured over the whole exchange.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Forwarding Engine
// ============================================================================

/// Reader scratch buffer size (40 KiB), also the maximum chunk length.
pub const READ_CHUNK_SIZE: usize = 40960;
/// Writer coalescing buffer capacity (40 KiB).
pub const WRITE_BUFFER_SIZE: usize = 40960;
/// Interval at which a paused writer re-checks its flags.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Listener
// ============================================================================

/// Delay before rebuilding a failed server socket.
pub const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(3);
/// Default TCP listener backlog.
pub const DEFAULT_LISTEN_BACKLOG: u32 = 3;

// ============================================================================
// Outbound Connections
// ============================================================================

/// Default outbound connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
