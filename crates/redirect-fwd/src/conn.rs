//! Per-connection state: role, counters, writer control flags.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Which side of the session a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}

/// Cumulative byte counters for one connection, shared with its workers.
#[derive(Debug, Default)]
pub struct ConnStats {
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    bytes_skipped: AtomicU64,
    last_write: Mutex<Option<Instant>>,
}

impl ConnStats {
    pub(crate) fn add_in(&self, n: u64) {
        self.bytes_in.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, n: u64) {
        self.bytes_out.fetch_add(n, Ordering::Relaxed);
        *self.last_write.lock() = Some(Instant::now());
    }

    pub(crate) fn add_skipped(&self, n: u64) {
        self.bytes_skipped.fetch_add(n, Ordering::Relaxed);
    }

    /// Bytes read from the socket.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.load(Ordering::Relaxed)
    }

    /// Bytes written to the socket.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.load(Ordering::Relaxed)
    }

    /// Bytes deliberately discarded while skip mode was on.
    pub fn bytes_skipped(&self) -> u64 {
        self.bytes_skipped.load(Ordering::Relaxed)
    }

    /// Time of the most recent successful socket write.
    pub fn last_write_at(&self) -> Option<Instant> {
        *self.last_write.lock()
    }
}

/// Externally togglable writer flags, observed within the pause-poll
/// interval rather than instantaneously.
#[derive(Debug, Default)]
pub(crate) struct WriterControl {
    pause: AtomicBool,
    skip_data: AtomicBool,
}

impl WriterControl {
    pub(crate) fn paused(&self) -> bool {
        self.pause.load(Ordering::Relaxed)
    }

    pub(crate) fn skip_data(&self) -> bool {
        self.skip_data.load(Ordering::Relaxed)
    }
}

/// One side of a forwarding session: a socket bound to a reader worker
/// and a writer worker over a designated queue pair.
#[derive(Debug)]
pub struct Connection {
    role: Role,
    remote_addr: String,
    stats: Arc<ConnStats>,
    control: Arc<WriterControl>,
    cancel: CancellationToken,
}

impl Connection {
    pub(crate) fn new(role: Role, remote_addr: String) -> Self {
        Self {
            role,
            remote_addr,
            stats: Arc::new(ConnStats::default()),
            control: Arc::new(WriterControl::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn stats(&self) -> &ConnStats {
        &self.stats
    }

    pub fn bytes_in(&self) -> u64 {
        self.stats.bytes_in()
    }

    pub fn bytes_out(&self) -> u64 {
        self.stats.bytes_out()
    }

    /// Pause the writer: it idles without consuming from its queue.
    pub fn set_paused(&self, paused: bool) {
        self.control.pause.store(paused, Ordering::Relaxed);
    }

    /// Discard dequeued chunks instead of writing them.
    pub fn set_skip_data(&self, skip: bool) {
        self.control.skip_data.store(skip, Ordering::Relaxed);
    }

    /// Signal both workers to stop. Idempotent; the workers release the
    /// socket halves as they exit, the write side through the terminator.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn shared_stats(&self) -> Arc<ConnStats> {
        self.stats.clone()
    }

    pub(crate) fn shared_control(&self) -> Arc<WriterControl> {
        self.control.clone()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
