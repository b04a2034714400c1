//! Relay listener: accept loop with self-healing socket rebuild.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use redirect_core::defaults::LISTENER_RETRY_DELAY;
use redirect_core::registry::ChannelRegistry;
use redirect_fwd::{Session, terminator};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handshake;

/// Run the relay listener until shutdown.
///
/// Outer loop owns the server socket for the whole process lifetime: a
/// failure to create it, or a failed accept, closes the socket, sleeps
/// 3 s and rebuilds, so transient bind failures self-heal without
/// intervention.
pub async fn run(
    config: ServerConfig,
    registry: Arc<ChannelRegistry>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listen: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|_| ServerError::Config(format!("invalid listen address: {}", config.server.listen)))?;

    let handshake_timeout = Duration::from_secs(config.timeouts.handshake_timeout_secs);
    let connect_timeout = Duration::from_secs(config.timeouts.connect_timeout_secs);
    let next_uid = Arc::new(AtomicU64::new(1));

    loop {
        if shutdown.is_cancelled() {
            return Ok(());
        }

        match create_listener(listen, config.server.backlog) {
            Ok(listener) => {
                info!(address = %listen, backlog = config.server.backlog, "server socket ready");
                accept_loop(
                    &listener,
                    &registry,
                    &next_uid,
                    handshake_timeout,
                    connect_timeout,
                    &shutdown,
                )
                .await;
                terminator::close_listener(listener);
                if shutdown.is_cancelled() {
                    info!("listener shutting down");
                    return Ok(());
                }
            }
            Err(e) => error!(address = %listen, error = %e, "failed to create server socket"),
        }

        info!("sleeping {}s before listening again", LISTENER_RETRY_DELAY.as_secs());
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            _ = tokio::time::sleep(LISTENER_RETRY_DELAY) => {}
        }
    }
}

/// Accept until shutdown or an accept failure (which signals the outer
/// loop to rebuild the socket rather than spin on a broken listener).
async fn accept_loop(
    listener: &TcpListener,
    registry: &Arc<ChannelRegistry>,
    next_uid: &Arc<AtomicU64>,
    handshake_timeout: Duration,
    connect_timeout: Duration,
    shutdown: &CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => return,

            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "new connection");
                    let registry = registry.clone();
                    let next_uid = next_uid.clone();
                    tokio::spawn(
                        handle_conn(stream, peer, registry, next_uid, handshake_timeout, connect_timeout)
                            .instrument(info_span!("conn", peer = %peer)),
                    );
                }
                Err(e) => {
                    error!(error = %e, "failed to accept new socket");
                    return;
                }
            }
        }
    }
}

/// Negotiate one accepted socket and, on success, start forwarding.
async fn handle_conn(
    mut stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ChannelRegistry>,
    next_uid: Arc<AtomicU64>,
    handshake_timeout: Duration,
    connect_timeout: Duration,
) {
    let target = match handshake::negotiate(&mut stream, &registry, handshake_timeout).await {
        Ok(target) => target,
        Err(e) => {
            warn!(peer = %peer, error = %e, "handshake failed, dropping socket");
            terminator::close_stream(stream);
            return;
        }
    };

    let outbound =
        match tokio::time::timeout(connect_timeout, TcpStream::connect(target.addr())).await {
            Ok(Ok(outbound)) => outbound,
            Ok(Err(e)) => {
                warn!(destination = %target, error = %e, "connect to target failed");
                terminator::close_stream(stream);
                return;
            }
            Err(_) => {
                warn!(destination = %target, "connect to target timed out");
                terminator::close_stream(stream);
                return;
            }
        };

    let server_addr = outbound
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| target.addr());
    let uid = next_uid.fetch_add(1, Ordering::Relaxed);
    info!(session = uid, channel = %target.channel, server = %server_addr, "forwarding started");

    Session::start(uid, peer.to_string(), stream, server_addr, outbound);
}

/// Create a TCP listener with an explicit backlog.
fn create_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener, ServerError> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog as i32)?;
    let listener = TcpListener::from_std(std::net::TcpListener::from(socket))?;
    Ok(listener)
}
