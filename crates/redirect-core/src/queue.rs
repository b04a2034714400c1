//! FIFO chunk queue with a live buffered-byte total.
//!
//! One queue carries one direction of a forwarding session: the reader on
//! one socket pushes chunks, the writer on the other socket pops them.
//! The queue is unbounded; backpressure comes from reader/writer pacing,
//! not from blocking producers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// One unit of buffered data moving through a queue.
///
/// `Done` is the terminal marker: the producer guarantees it is the last
/// chunk it ever enqueues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(Bytes),
    /// No further data will follow from this producer.
    Done,
}

impl Chunk {
    /// Byte length of the chunk payload (`Done` counts as zero).
    pub fn len(&self) -> usize {
        match self {
            Chunk::Data(data) => data.len(),
            Chunk::Done => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe FIFO of chunks, tracking the total bytes currently queued.
#[derive(Debug, Default)]
pub struct ByteQueue {
    inner: Mutex<VecDeque<Chunk>>,
    available: Notify,
    total_bytes: AtomicU64,
}

impl ByteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the tail. Never blocks.
    pub fn push(&self, chunk: Chunk) {
        let len = chunk.len() as u64;
        self.inner.lock().push_back(chunk);
        self.total_bytes.fetch_add(len, Ordering::Relaxed);
        self.available.notify_one();
    }

    /// Remove the head chunk, waiting until one is available.
    pub async fn pop(&self) -> Chunk {
        loop {
            // Register for wakeup before checking, so a push racing with
            // the check cannot be missed.
            let notified = self.available.notified();
            if let Some(chunk) = self.try_pop() {
                return chunk;
            }
            notified.await;
        }
    }

    /// Remove the head chunk if one is queued, without waiting.
    pub fn try_pop(&self) -> Option<Chunk> {
        let chunk = self.inner.lock().pop_front()?;
        self.total_bytes
            .fetch_sub(chunk.len() as u64, Ordering::Relaxed);
        Some(chunk)
    }

    /// Total payload bytes currently queued.
    pub fn buffered_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }
}
