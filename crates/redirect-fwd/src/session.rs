//! Forwarding session: two connections joined by two chunk queues.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::info;

use redirect_core::queue::ByteQueue;

use crate::conn::{Connection, Role};
use crate::{reader, writer};

/// One end-to-end forwarding relationship between a client-side stream
/// and a server-side stream.
///
/// The server-side writer drains the queue the client-side reader fills,
/// and vice versa. The first worker to terminate triggers
/// [`close_detected`](Session::close_detected), which logs a one-time
/// summary and closes both connections; a half-open session is never a
/// valid end state.
#[derive(Debug)]
pub struct Session {
    uid: u64,
    client: Connection,
    server: Connection,
    /// client -> server chunks.
    to_server: Arc<ByteQueue>,
    /// server -> client chunks.
    to_client: Arc<ByteQueue>,
    close_fired: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Wire both streams together and start the four workers.
    ///
    /// Both streams must already be connected; `client_addr` and
    /// `server_addr` are their remote addresses, used only for logging.
    pub fn start<C, S>(
        uid: u64,
        client_addr: String,
        client_stream: C,
        server_addr: String,
        server_stream: S,
    ) -> Arc<Self>
    where
        C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let session = Arc::new(Self {
            uid,
            client: Connection::new(Role::Client, client_addr),
            server: Connection::new(Role::Server, server_addr),
            to_server: Arc::new(ByteQueue::new()),
            to_client: Arc::new(ByteQueue::new()),
            close_fired: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        });

        let (client_read, client_write) = tokio::io::split(client_stream);
        let (server_read, server_write) = tokio::io::split(server_stream);

        let workers = vec![
            reader::spawn(
                session.clone(),
                Role::Client,
                client_read,
                session.to_server.clone(),
            ),
            writer::spawn(
                session.clone(),
                Role::Client,
                client_write,
                session.to_client.clone(),
            ),
            reader::spawn(
                session.clone(),
                Role::Server,
                server_read,
                session.to_client.clone(),
            ),
            writer::spawn(
                session.clone(),
                Role::Server,
                server_write,
                session.to_server.clone(),
            ),
        ];
        *session.workers.lock() = workers;

        session
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn client(&self) -> &Connection {
        &self.client
    }

    pub fn server(&self) -> &Connection {
        &self.server
    }

    pub(crate) fn conn(&self, role: Role) -> &Connection {
        match role {
            Role::Client => &self.client,
            Role::Server => &self.server,
        }
    }

    /// Joint teardown choke point, reached independently from any worker.
    ///
    /// The first caller logs the session summary; every caller closes
    /// both connections (idempotent).
    pub fn close_detected(&self) {
        if !self.close_fired.swap(true, Ordering::SeqCst) {
            info!(
                session = self.uid,
                client = %self.client.remote_addr(),
                server = %self.server.remote_addr(),
                queued_to_server = self.to_server.buffered_bytes(),
                queued_to_client = self.to_client.buffered_bytes(),
                client_read = self.client.bytes_in(),
                client_written = self.client.bytes_out(),
                server_read = self.server.bytes_in(),
                server_written = self.server.bytes_out(),
                "session closed"
            );
        }
        self.close();
    }

    /// Close both connections, client first.
    pub fn close(&self) {
        self.close_client();
        self.close_server();
    }

    pub fn close_client(&self) {
        self.client.close();
    }

    pub fn close_server(&self) {
        self.server.close();
    }

    /// Whether teardown has been triggered.
    pub fn is_closed(&self) -> bool {
        self.close_fired.load(Ordering::SeqCst)
    }

    /// Wait for all four workers to finish. Intended for tests and
    /// controlled shutdown; forwarding itself never awaits this.
    pub async fn wait(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use bytes::Bytes;
    use redirect_core::defaults::WRITE_BUFFER_SIZE;
    use redirect_core::queue::Chunk;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadBuf, duplex};

    /// Never-ready reader; records the size of every write call.
    #[derive(Clone, Default)]
    struct RecordingStream {
        writes: Arc<Mutex<Vec<usize>>>,
    }

    impl AsyncRead for RecordingStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for RecordingStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            data: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.writes.lock().push(data.len());
            Poll::Ready(Ok(data.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn writer_batches_small_chunks() {
        let sink = RecordingStream::default();
        let writes = sink.writes.clone();

        let session = Session::start(
            7,
            "client".into(),
            RecordingStream::default(),
            "server".into(),
            sink,
        );

        // Hold the server writer while the queue fills, then release it
        // so it drains the backlog in one pass.
        session.server().set_paused(true);
        assert!(session.server().stats().last_write_at().is_none());
        for _ in 0..5 {
            session
                .to_server
                .push(Chunk::Data(Bytes::from(vec![0u8; 10240])));
        }
        session.server().set_paused(false);

        // 5 x 10 KiB against a 40 KiB buffer: one overflow flush of a
        // full buffer, then one flush of the remainder.
        tokio::time::timeout(Duration::from_secs(5), async {
            while writes.lock().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("writer never flushed");

        assert_eq!(*writes.lock(), vec![WRITE_BUFFER_SIZE, 10240]);
        assert_eq!(session.server().bytes_out(), 5 * 10240);
        assert!(session.server().stats().last_write_at().is_some());

        session.close();
        session.wait().await;
    }

    #[tokio::test]
    async fn reader_terminates_queue_with_single_done() {
        use redirect_core::defaults::READ_CHUNK_SIZE;

        let session = Session::start(
            9,
            "client".into(),
            RecordingStream::default(),
            "server".into(),
            RecordingStream::default(),
        );

        // Side queue with no consumer, so every chunk the reader
        // produces is still there for inspection.
        let (mut far, near) = duplex(256 * 1024);
        let (near_read, _near_write) = tokio::io::split(near);
        let queue = Arc::new(ByteQueue::new());
        let handle = reader::spawn(session.clone(), Role::Client, near_read, queue.clone());

        let payload = vec![0x7fu8; 100_000];
        far.write_all(&payload).await.unwrap();
        drop(far);
        handle.await.unwrap();

        let mut total = 0usize;
        loop {
            match queue.try_pop().expect("queue must end with Done") {
                Chunk::Data(bytes) => {
                    assert!(bytes.len() <= READ_CHUNK_SIZE);
                    total += bytes.len();
                }
                Chunk::Done => break,
            }
        }
        assert_eq!(total, payload.len());
        assert!(queue.try_pop().is_none());
        assert_eq!(session.client().bytes_in(), payload.len() as u64);

        session.wait().await;
    }

    fn start_over_duplex() -> (
        Arc<Session>,
        tokio::io::DuplexStream,
        tokio::io::DuplexStream,
    ) {
        let (client_far, client_near) = duplex(256 * 1024);
        let (server_near, server_far) = duplex(256 * 1024);
        let session = Session::start(
            1,
            "10.0.0.1:50000".into(),
            client_near,
            "10.0.0.5:9000".into(),
            server_near,
        );
        (session, client_far, server_far)
    }

    #[tokio::test]
    async fn forwards_both_directions() {
        let (session, mut client, mut server) = start_over_duplex();

        client.write_all(b"ping from client").await.unwrap();
        let mut buf = [0u8; 16];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping from client");

        server.write_all(b"pong from server").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong from server");

        drop(client);
        drop(server);
        session.wait().await;

        assert!(session.is_closed());
        assert_eq!(session.client().bytes_in(), 16);
        assert_eq!(session.server().bytes_out(), 16);
        assert_eq!(session.server().bytes_in(), 16);
        assert_eq!(session.client().bytes_out(), 16);
    }

    #[tokio::test]
    async fn peer_disconnect_tears_down_both_sides() {
        let (session, mut client, mut server) = start_over_duplex();

        let payload = vec![0xabu8; 1000];
        client.write_all(&payload).await.unwrap();
        let mut buf = vec![0u8; 1000];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, payload);

        // Server side goes away mid-stream.
        drop(server);
        session.wait().await;

        assert!(session.is_closed());
        assert!(session.client().is_closed());
        assert!(session.server().is_closed());
        assert_eq!(session.client().bytes_in(), 1000);
        assert_eq!(session.server().bytes_out(), 1000);

        drop(client);
    }

    #[tokio::test]
    async fn close_detection_fires_once() {
        let (session, client, server) = start_over_duplex();

        let mut triggers = Vec::new();
        for _ in 0..4 {
            let session = session.clone();
            triggers.push(tokio::spawn(async move { session.close_detected() }));
        }
        for t in triggers {
            t.await.unwrap();
        }

        session.wait().await;
        assert!(session.is_closed());
        assert!(session.client().is_closed());
        assert!(session.server().is_closed());

        drop(client);
        drop(server);
    }

    #[tokio::test]
    async fn skip_data_discards_and_counts() {
        let (session, mut client, mut server) = start_over_duplex();

        session.server().set_skip_data(true);
        client.write_all(&[1u8; 500]).await.unwrap();

        // Give the skipped bytes time to flow through the queue.
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.server().stats().bytes_skipped() < 500 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("skipped bytes never counted");

        assert_eq!(session.server().bytes_out(), 0);

        session.server().set_skip_data(false);
        client.write_all(b"kept").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"kept");

        session.close();
        session.wait().await;
    }

    #[tokio::test]
    async fn paused_writer_holds_data_until_resumed() {
        let (session, mut client, mut server) = start_over_duplex();

        session.server().set_paused(true);
        client.write_all(b"held back").await.unwrap();

        // The writer must not deliver while paused.
        let mut buf = [0u8; 9];
        let read = tokio::time::timeout(Duration::from_millis(300), server.read_exact(&mut buf));
        assert!(read.await.is_err());

        session.server().set_paused(false);
        tokio::time::timeout(Duration::from_secs(5), server.read_exact(&mut buf))
            .await
            .expect("resume timed out")
            .unwrap();
        assert_eq!(&buf, b"held back");

        session.close();
        session.wait().await;
    }
}
