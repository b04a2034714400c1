//! Client-role handshake negotiation.
//!
//! Sends the 50-byte channel request frame, then reads the 50-byte
//! response as an acknowledgement: only the frame shape (size and
//! delimiter) is validated, never the payload. The relay already chose
//! the destination; the response content carries nothing the client
//! acts on.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use redirect_core::defaults::{HANDSHAKE_DELIMITER, HANDSHAKE_FRAME_LEN};
use redirect_core::frame;

use crate::error::HandshakeError;

/// Confirm a channel with the relay over a freshly dialed socket.
pub async fn negotiate<S>(
    stream: &mut S,
    channel: &str,
    deadline: Duration,
) -> Result<(), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::time::timeout(deadline, exchange(stream, channel))
        .await
        .map_err(|_| HandshakeError::Timeout)?
}

async fn exchange<S>(stream: &mut S, channel: &str) -> Result<(), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = frame::encode_frame(channel)?;
    frame::write_frame(stream, &request).await?;

    let response = frame::read_frame(stream).await?;
    let delim = response[HANDSHAKE_FRAME_LEN - 1];
    if delim != HANDSHAKE_DELIMITER {
        return Err(HandshakeError::BadDelimiter(delim));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    #[tokio::test]
    async fn sends_channel_and_accepts_ack() {
        let (mut client, mut relay) = duplex(256);

        let relay_side = tokio::spawn(async move {
            let request = frame::read_frame(&mut relay).await.unwrap();
            assert_eq!(frame::decode_frame(&request).unwrap(), "CHAN_A");
            let response = frame::encode_frame("10.0.0.5:9000").unwrap();
            frame::write_frame(&mut relay, &response).await.unwrap();
        });

        negotiate(&mut client, "CHAN_A", Duration::from_secs(1))
            .await
            .unwrap();
        relay_side.await.unwrap();
    }

    #[tokio::test]
    async fn response_payload_is_not_validated() {
        let (mut client, mut relay) = duplex(256);

        // Garbage payload, valid shape: still an acceptable ack.
        let relay_side = tokio::spawn(async move {
            let _ = frame::read_frame(&mut relay).await.unwrap();
            let mut response = [0xffu8; HANDSHAKE_FRAME_LEN];
            response[HANDSHAKE_FRAME_LEN - 1] = HANDSHAKE_DELIMITER;
            relay.write_all(&response).await.unwrap();
        });

        negotiate(&mut client, "CHAN_A", Duration::from_secs(1))
            .await
            .unwrap();
        relay_side.await.unwrap();
    }

    #[tokio::test]
    async fn bad_response_delimiter_fails() {
        let (mut client, mut relay) = duplex(256);

        let relay_side = tokio::spawn(async move {
            let _ = frame::read_frame(&mut relay).await.unwrap();
            relay.write_all(&[b' '; HANDSHAKE_FRAME_LEN]).await.unwrap();
        });

        let err = negotiate(&mut client, "CHAN_A", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::BadDelimiter(b' ')));
        relay_side.await.unwrap();
    }

    #[tokio::test]
    async fn missing_response_times_out() {
        let (mut client, mut relay) = duplex(256);

        let relay_side = tokio::spawn(async move {
            let _ = frame::read_frame(&mut relay).await.unwrap();
            // Never respond; hold the stream open past the deadline.
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(relay);
        });

        let err = negotiate(&mut client, "CHAN_A", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Timeout));
        relay_side.await.unwrap();
    }
}
