//! Duplex TCP forwarding engine.
//!
//! A [`Session`] wires two already-connected streams together through a
//! pair of chunk queues (client -> server and server -> client) and four
//! workers: one reader and one writer per stream. Any worker failing
//! tears the whole session down exactly once.
//!
//! Streams are generic over `AsyncRead + AsyncWrite`, so tests can drive
//! sessions over in-memory `tokio::io::duplex` pairs.

mod conn;
mod reader;
mod session;
pub mod terminator;
mod writer;

pub use conn::{ConnStats, Connection, Role};
pub use session::Session;
pub use tokio_util::sync::CancellationToken;
