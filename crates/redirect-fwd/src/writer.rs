//! Writer worker: queue -> socket, with write batching.

use std::io::ErrorKind;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span};

use redirect_core::defaults::{PAUSE_POLL_INTERVAL, WRITE_BUFFER_SIZE};
use redirect_core::queue::{ByteQueue, Chunk};

use crate::conn::Role;
use crate::session::Session;
use crate::terminator;

/// Spawn the writer worker for one connection.
///
/// Drains the queue into a 40 KiB coalescing buffer to batch small
/// chunks into fewer socket writes, never reordering bytes:
///
/// - blocking dequeue only while the buffer is empty; otherwise a
///   non-blocking poll, so a partially filled buffer flushes as soon as
///   the queue momentarily drains
/// - a chunk that fits the remaining capacity is appended; otherwise the
///   buffer is flushed first, and a chunk at least the buffer capacity
///   is written directly
/// - [`Chunk::Done`] stops the worker with no further writes
///
/// While `pause` is set the worker idles without consuming; while
/// `skip_data` is set dequeued chunks are counted and dropped. Any write
/// fault is terminal: log, stop, trigger session close detection.
pub(crate) fn spawn<W>(
    session: Arc<Session>,
    role: Role,
    mut stream: W,
    queue: Arc<ByteQueue>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let conn = session.conn(role);
    let cancel = conn.cancel_token();
    let stats = conn.shared_stats();
    let control = conn.shared_control();
    let remote = conn.remote_addr().to_string();
    let span = info_span!("writer", session = session.uid(), role = %role);

    tokio::spawn(
        async move {
            let mut buf: Vec<u8> = Vec::with_capacity(WRITE_BUFFER_SIZE);

            'run: loop {
                if cancel.is_cancelled() {
                    debug!(peer = %remote, "writer stopped");
                    break;
                }

                if control.paused() {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(PAUSE_POLL_INTERVAL) => {}
                    }
                    continue;
                }

                // Block only when nothing is pending flush.
                let chunk = if buf.is_empty() {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => continue,
                        chunk = queue.pop() => Some(chunk),
                    }
                } else {
                    queue.try_pop()
                };

                match chunk {
                    None => {
                        // Queue drained while bytes are buffered: flush now
                        // so bursty-then-idle traffic is not stalled.
                        match write_all(&mut stream, &buf, &cancel).await {
                            Ok(()) => stats.record_write(buf.len() as u64),
                            Err(e) => {
                                log_write_error(&cancel, &remote, &e);
                                break 'run;
                            }
                        }
                        buf.clear();
                    }
                    Some(Chunk::Done) => {
                        debug!(peer = %remote, "end of data");
                        break;
                    }
                    Some(Chunk::Data(data)) => {
                        if control.skip_data() {
                            stats.add_skipped(data.len() as u64);
                            continue;
                        }
                        if data.len() <= WRITE_BUFFER_SIZE - buf.len() {
                            buf.extend_from_slice(&data);
                        } else {
                            if !buf.is_empty() {
                                match write_all(&mut stream, &buf, &cancel).await {
                                    Ok(()) => stats.record_write(buf.len() as u64),
                                    Err(e) => {
                                        log_write_error(&cancel, &remote, &e);
                                        break 'run;
                                    }
                                }
                                buf.clear();
                            }
                            if data.len() >= WRITE_BUFFER_SIZE {
                                // Buffering gains nothing for a chunk this
                                // large; write it through.
                                match write_all(&mut stream, &data, &cancel).await {
                                    Ok(()) => stats.record_write(data.len() as u64),
                                    Err(e) => {
                                        log_write_error(&cancel, &remote, &e);
                                        break 'run;
                                    }
                                }
                            } else {
                                buf.extend_from_slice(&data);
                            }
                        }
                    }
                }
            }

            terminator::close_stream(stream);
            session.close_detected();
        }
        .instrument(span),
    )
}

/// Write a full slice, abandoning the write if the connection is closed
/// underneath it.
async fn write_all<W>(
    stream: &mut W,
    data: &[u8],
    cancel: &CancellationToken,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ErrorKind::Interrupted.into()),
        result = stream.write_all(data) => result,
    }
}

fn log_write_error(cancel: &CancellationToken, remote: &str, e: &std::io::Error) {
    if cancel.is_cancelled() {
        debug!(peer = %remote, error = %e, "write ended");
    } else {
        error!(peer = %remote, error = %e, "write failed");
    }
}
