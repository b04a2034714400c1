//! Handshake frame codec: encode and decode.
//!
//! Format (fixed 50 bytes, both request and response):
//! ```text
//! +------------------+----------------------+-----------+
//! |  UTF-8 payload   |  0x20 space padding  | delimiter |
//! +------------------+----------------------+-----------+
//! |     0 .. n       |       n .. 49        |  X'03'    |
//! +------------------+----------------------+-----------+
//! ```
//!
//! The request payload is a channel id; the response payload is the
//! resolved `host:port` of the destination.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::defaults::{HANDSHAKE_DELIMITER, HANDSHAKE_FRAME_LEN, HANDSHAKE_PADDING};
use crate::error::FrameError;

/// A raw handshake frame.
pub type Frame = [u8; HANDSHAKE_FRAME_LEN];

/// Encode a payload string into a padded, delimited frame.
///
/// Fails if the UTF-8 byte length exceeds the payload area (49 bytes).
pub fn encode_frame(payload: &str) -> Result<Frame, FrameError> {
    let bytes = payload.as_bytes();
    if bytes.len() > HANDSHAKE_FRAME_LEN - 1 {
        return Err(FrameError::PayloadTooLong(bytes.len()));
    }
    let mut frame = [HANDSHAKE_PADDING; HANDSHAKE_FRAME_LEN];
    frame[..bytes.len()].copy_from_slice(bytes);
    frame[HANDSHAKE_FRAME_LEN - 1] = HANDSHAKE_DELIMITER;
    Ok(frame)
}

/// Decode a frame back into its payload string.
///
/// Validates the delimiter, then trims the space padding (and any
/// surrounding whitespace in the payload itself).
pub fn decode_frame(frame: &Frame) -> Result<String, FrameError> {
    let delim = frame[HANDSHAKE_FRAME_LEN - 1];
    if delim != HANDSHAKE_DELIMITER {
        return Err(FrameError::BadDelimiter(delim));
    }
    let payload = std::str::from_utf8(&frame[..HANDSHAKE_FRAME_LEN - 1])
        .map_err(|_| FrameError::InvalidUtf8)?;
    Ok(payload.trim().to_string())
}

/// Read exactly one frame from the stream.
///
/// A stream ending before 50 bytes arrive yields `UnexpectedEof`.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut frame = [0u8; HANDSHAKE_FRAME_LEN];
    reader.read_exact(&mut frame).await?;
    Ok(frame)
}

/// Write one frame to the stream and flush it.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    #[test]
    fn encode_pads_and_delimits() {
        let frame = encode_frame("CHAN_A").unwrap();
        assert_eq!(frame.len(), HANDSHAKE_FRAME_LEN);
        assert_eq!(&frame[..6], b"CHAN_A");
        assert!(frame[6..HANDSHAKE_FRAME_LEN - 1].iter().all(|&b| b == b' '));
        assert_eq!(frame[HANDSHAKE_FRAME_LEN - 1], HANDSHAKE_DELIMITER);
    }

    #[test]
    fn roundtrip() {
        for payload in ["CHAN_A", "10.0.0.5:9000", "x", "a".repeat(48).as_str()] {
            let frame = encode_frame(payload).unwrap();
            assert_eq!(decode_frame(&frame).unwrap(), payload);
        }
    }

    #[test]
    fn payload_too_long() {
        let payload = "a".repeat(HANDSHAKE_FRAME_LEN);
        assert!(matches!(
            encode_frame(&payload),
            Err(FrameError::PayloadTooLong(50))
        ));
    }

    #[test]
    fn bad_delimiter() {
        let mut frame = encode_frame("CHAN_A").unwrap();
        frame[HANDSHAKE_FRAME_LEN - 1] = b'X';
        assert!(matches!(
            decode_frame(&frame),
            Err(FrameError::BadDelimiter(b'X'))
        ));
    }

    #[test]
    fn invalid_utf8() {
        let mut frame = encode_frame("CHAN_A").unwrap();
        frame[0] = 0xff;
        assert!(matches!(decode_frame(&frame), Err(FrameError::InvalidUtf8)));
    }

    #[tokio::test]
    async fn wire_roundtrip() {
        let (mut client, mut server) = duplex(128);
        let frame = encode_frame("CHAN_A").unwrap();
        write_frame(&mut client, &frame).await.unwrap();

        let got = read_frame(&mut server).await.unwrap();
        assert_eq!(decode_frame(&got).unwrap(), "CHAN_A");
    }

    #[tokio::test]
    async fn short_stream_is_eof() {
        let (mut client, mut server) = duplex(128);
        client.write_all(b"CHAN_A").await.unwrap();
        drop(client);

        let err = read_frame(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
