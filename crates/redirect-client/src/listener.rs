//! Per-channel local listeners.
//!
//! The client runs one listener per configured channel. Each accepted
//! local connection dials the relay, confirms the channel with the
//! client-role handshake, and then forwards bytes between the local
//! socket and the relay socket until either side disconnects.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use redirect_core::defaults::LISTENER_RETRY_DELAY;
use redirect_fwd::{Session, terminator};

use crate::config::{ChannelBinding, ClientConfig, TimeoutConfig};
use crate::error::ClientError;
use crate::handshake;

/// Run all channel listeners until shutdown.
pub async fn run(config: ClientConfig, shutdown: CancellationToken) -> Result<(), ClientError> {
    let remote = Arc::new(config.client.remote.clone());
    let timeouts = config.timeouts.clone();
    let next_uid = Arc::new(AtomicU64::new(1));

    let mut handles = Vec::new();
    for binding in config.channels {
        info!(channel = %binding.channel, listen = %binding.listen, "channel listener starting");
        let remote = remote.clone();
        let timeouts = timeouts.clone();
        let next_uid = next_uid.clone();
        let shutdown = shutdown.clone();
        let channel = binding.channel.clone();

        handles.push(tokio::spawn(
            async move { run_channel(binding, remote, timeouts, next_uid, shutdown).await }
                .instrument(info_span!("channel", id = %channel)),
        ));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "channel listener task panicked");
        }
    }
    Ok(())
}

/// One channel's listener lifetime: bind, accept, rebuild on failure.
async fn run_channel(
    binding: ChannelBinding,
    remote: Arc<String>,
    timeouts: TimeoutConfig,
    next_uid: Arc<AtomicU64>,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }

        match TcpListener::bind(&binding.listen).await {
            Ok(listener) => {
                info!(listen = %binding.listen, "local socket ready");
                accept_loop(&listener, &binding, &remote, &timeouts, &next_uid, &shutdown).await;
                terminator::close_listener(listener);
                if shutdown.is_cancelled() {
                    info!("channel listener shutting down");
                    return;
                }
            }
            Err(e) => error!(listen = %binding.listen, error = %e, "failed to create local socket"),
        }

        info!("sleeping {}s before listening again", LISTENER_RETRY_DELAY.as_secs());
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(LISTENER_RETRY_DELAY) => {}
        }
    }
}

async fn accept_loop(
    listener: &TcpListener,
    binding: &ChannelBinding,
    remote: &Arc<String>,
    timeouts: &TimeoutConfig,
    next_uid: &Arc<AtomicU64>,
    shutdown: &CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => return,

            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "new local connection");
                    let channel = binding.channel.clone();
                    let remote = remote.clone();
                    let timeouts = timeouts.clone();
                    let next_uid = next_uid.clone();
                    tokio::spawn(
                        handle_local_conn(stream, peer, channel, remote, timeouts, next_uid)
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

/// Tunnel one local connection through the relay.
async fn handle_local_conn(
    local: TcpStream,
    peer: SocketAddr,
    channel: String,
    remote: Arc<String>,
    timeouts: TimeoutConfig,
    next_uid: Arc<AtomicU64>,
) {
    let connect_timeout = Duration::from_secs(timeouts.connect_timeout_secs);
    let handshake_timeout = Duration::from_secs(timeouts.handshake_timeout_secs);

    let mut relay =
        match tokio::time::timeout(connect_timeout, TcpStream::connect(remote.as_str())).await {
            Ok(Ok(relay)) => relay,
            Ok(Err(e)) => {
                warn!(remote = %remote, error = %e, "connect to relay failed");
                terminator::close_stream(local);
                return;
            }
            Err(_) => {
                warn!(remote = %remote, "connect to relay timed out");
                terminator::close_stream(local);
                return;
            }
        };

    if let Err(e) = handshake::negotiate(&mut relay, &channel, handshake_timeout).await {
        warn!(channel = %channel, error = %e, "handshake failed, dropping sockets");
        terminator::close_stream(relay);
        terminator::close_stream(local);
        return;
    }

    let relay_addr = relay
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| remote.to_string());
    let uid = next_uid.fetch_add(1, Ordering::Relaxed);
    info!(session = uid, channel = %channel, relay = %relay_addr, "forwarding started");

    Session::start(uid, peer.to_string(), local, relay_addr, relay);
}
