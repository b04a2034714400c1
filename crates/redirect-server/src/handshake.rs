//! Server-role handshake negotiation.
//!
//! Runs once per accepted socket, under a single deadline covering the
//! whole exchange:
//! 1. Read the fixed 50-byte request frame.
//! 2. Validate the delimiter, decode the channel id.
//! 3. Resolve the channel via the registry.
//! 4. Send the 50-byte response frame carrying the target `host:port`.
//!
//! After a successful negotiation the socket carries no deadline;
//! steady-state forwarding may idle indefinitely.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use redirect_core::frame;
use redirect_core::registry::{ChannelRegistry, Target};

use crate::error::HandshakeError;

/// Negotiate the channel for a newly accepted socket.
///
/// Any short read, missed delimiter, unknown channel, or deadline expiry
/// aborts the handshake; the caller drops the socket, never retries.
pub async fn negotiate<S>(
    stream: &mut S,
    registry: &ChannelRegistry,
    deadline: Duration,
) -> Result<Target, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::time::timeout(deadline, exchange(stream, registry))
        .await
        .map_err(|_| HandshakeError::Timeout)?
}

async fn exchange<S>(
    stream: &mut S,
    registry: &ChannelRegistry,
) -> Result<Target, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = frame::read_frame(stream).await?;
    let channel = frame::decode_frame(&request)?;

    let target = registry
        .lookup(&channel)
        .ok_or(HandshakeError::UnknownChannel(channel))?;

    let response = frame::encode_frame(&target.addr())?;
    frame::write_frame(stream, &response).await?;

    Ok(target)
}
