//! Asynchronous best-effort socket closer.
//!
//! Close latency or failure on one resource must never block the worker
//! that requested the teardown, so every close runs on its own task and
//! every failure is logged and swallowed.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::debug;

/// Shut down and drop a stream (or write half) on a detached task.
pub fn close_stream<S>(mut stream: S)
where
    S: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "failed to shut down stream");
        }
    });
}

/// Drop a server socket on a detached task.
pub fn close_listener(listener: TcpListener) {
    tokio::spawn(async move {
        drop(listener);
        debug!("server socket closed");
    });
}
