//! Reader worker: socket -> queue.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span};

use redirect_core::defaults::READ_CHUNK_SIZE;
use redirect_core::queue::{ByteQueue, Chunk};

use crate::conn::Role;
use crate::session::Session;

/// Spawn the reader worker for one connection.
///
/// Pulls bytes from the stream into 40 KiB chunks and enqueues them.
/// One failure (or end of stream) ends the direction permanently; the
/// cleanup path unconditionally enqueues [`Chunk::Done`] so the writer
/// draining this queue observes end-of-data after all real chunks, then
/// signals session close detection.
pub(crate) fn spawn<R>(
    session: Arc<Session>,
    role: Role,
    mut stream: R,
    queue: Arc<ByteQueue>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let conn = session.conn(role);
    let cancel = conn.cancel_token();
    let stats = conn.shared_stats();
    let remote = conn.remote_addr().to_string();
    let span = info_span!("reader", session = session.uid(), role = %role);

    tokio::spawn(
        async move {
            let mut buf = vec![0u8; READ_CHUNK_SIZE];
            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!(peer = %remote, "reader stopped");
                        break;
                    }

                    result = stream.read(&mut buf) => match result {
                        Ok(0) => {
                            if cancel.is_cancelled() {
                                debug!(peer = %remote, "end of stream");
                            } else {
                                error!(peer = %remote, "end of stream");
                            }
                            break;
                        }
                        Ok(n) => {
                            queue.push(Chunk::Data(Bytes::copy_from_slice(&buf[..n])));
                            stats.add_in(n as u64);
                        }
                        Err(e) => {
                            if cancel.is_cancelled() {
                                debug!(peer = %remote, error = %e, "read ended");
                            } else {
                                error!(peer = %remote, error = %e, "read failed");
                            }
                            break;
                        }
                    }
                }
            }

            // Always the last chunk this worker enqueues.
            queue.push(Chunk::Done);
            session.close_detected();
        }
        .instrument(span),
    )
}
