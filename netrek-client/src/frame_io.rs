//! Deadline-governed frame I/O over an async byte stream (§4.6), mirrored
//! from the server side's codec over the same wire format.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use protocol::{FrameHeader, MessageType, FRAME_HEADER_LEN, MAX_PAYLOAD_LEN};

use crate::error::TransportError;

pub async fn read_frame<R: AsyncReadExt + Unpin>(stream: &mut R, deadline: Duration) -> Result<(MessageType, Vec<u8>), TransportError> {
    let header = tokio::time::timeout(deadline, read_header(stream))
        .await
        .map_err(|_| TransportError::DeadlineExceeded(deadline))??;
    let mut payload = vec![0u8; header.payload_len as usize];
    if header.payload_len > 0 {
        tokio::time::timeout(deadline, stream.read_exact(&mut payload))
            .await
            .map_err(|_| TransportError::DeadlineExceeded(deadline))??;
    }
    Ok((header.message_type, payload))
}

async fn read_header<R: AsyncReadExt + Unpin>(stream: &mut R) -> Result<FrameHeader, TransportError> {
    let mut bytes = [0u8; FRAME_HEADER_LEN];
    stream.read_exact(&mut bytes).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::Eof
        } else {
            TransportError::Io(e)
        }
    })?;
    FrameHeader::decode(bytes).map_err(|err| TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string())))
}

pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    stream: &mut W,
    message_type: MessageType,
    payload: &[u8],
    deadline: Duration,
) -> Result<(), TransportError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("frame payload of {} bytes exceeds the 64 KiB limit", payload.len()),
        )));
    }
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u8(message_type.as_byte());
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);
    tokio::time::timeout(deadline, stream.write_all(&buf))
        .await
        .map_err(|_| TransportError::DeadlineExceeded(deadline))??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_frame_through_a_duplex_stream() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, MessageType::PingRequest, b"\"hi\"", Duration::from_secs(1))
            .await
            .unwrap();
        let (ty, payload) = read_frame(&mut b, Duration::from_secs(1)).await.unwrap();
        assert_eq!(ty, MessageType::PingRequest);
        assert_eq!(payload, b"\"hi\"");
    }

    #[tokio::test]
    async fn read_times_out_when_nothing_arrives() {
        let (_a, mut b) = tokio::io::duplex(1024);
        let err = read_frame(&mut b, Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, TransportError::DeadlineExceeded(_)));
    }
}
