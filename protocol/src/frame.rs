//! Frame header: `u8` message type || `u16` big-endian payload length.
//!
//! Mirrors the teacher's single-tag-byte framing (`NEW_CLIENT`, `SERVER_RPC`,
//! ...) generalized to a closed [`MessageType`] enum with an explicit length
//! prefix, since this protocol runs over a raw byte stream rather than a
//! message-framed WebSocket transport.

use std::fmt;

use thiserror::Error;

/// Header size in bytes: 1 (type) + 2 (length).
pub const FRAME_HEADER_LEN: usize = 3;

/// Maximum permitted payload size: one below 64 KiB, so that every
/// admissible payload length still fits the wire's `u16` length prefix
/// without truncation (65536 would wrap to 0). Matches spec.md §8's
/// boundary: a 65536-byte message is rejected, 65535 is accepted.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 - 1;

/// The closed set of message types exchanged over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    ConnectRequest = 0,
    ConnectResponse = 1,
    DisconnectNotification = 2,
    GameStateUpdate = 3,
    PlayerInput = 4,
    ChatMessage = 5,
    PingRequest = 6,
    PingResponse = 7,
    RequestShipClass = 8,
}

impl MessageType {
    /// Recovers a `MessageType` from its wire byte, `None` for unknown tags.
    pub fn from_byte(byte: u8) -> Option<Self> {
        use MessageType::*;
        Some(match byte {
            0 => ConnectRequest,
            1 => ConnectResponse,
            2 => DisconnectNotification,
            3 => GameStateUpdate,
            4 => PlayerInput,
            5 => ChatMessage,
            6 => PingRequest,
            7 => PingResponse,
            8 => RequestShipClass,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A decoded frame header, before the payload body has been read.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub message_type: MessageType,
    pub payload_len: u16,
}

/// Errors decoding a frame header. The only way decoding a well-formed
/// 3-byte header can fail, since the length field accepts any `u16`.
#[derive(Debug, Error)]
pub enum FrameDecodeError {
    #[error("unrecognized message type byte {0}")]
    UnknownMessageType(u8),
}

impl FrameHeader {
    /// Decodes a 3-byte header. Errors on an unrecognized message type byte
    /// (the caller should close the connection on an unknown type during
    /// handshake, or skip-and-continue in the steady-state read loop per
    /// spec.md's "Unknown -> log and ignore").
    pub fn decode(bytes: [u8; FRAME_HEADER_LEN]) -> Result<Self, FrameDecodeError> {
        let message_type = MessageType::from_byte(bytes[0]).ok_or(FrameDecodeError::UnknownMessageType(bytes[0]))?;
        let payload_len = u16::from_be_bytes([bytes[1], bytes[2]]);
        Ok(FrameHeader {
            message_type,
            payload_len,
        })
    }

    pub fn encode(self) -> [u8; FRAME_HEADER_LEN] {
        let len = self.payload_len.to_be_bytes();
        [self.message_type.as_byte(), len[0], len[1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header() {
        let header = FrameHeader {
            message_type: MessageType::PlayerInput,
            payload_len: 1234,
        };
        let decoded = FrameHeader::decode(header.encode()).unwrap();
        assert_eq!(decoded.message_type, MessageType::PlayerInput);
        assert_eq!(decoded.payload_len, 1234);
    }

    #[test]
    fn rejects_unknown_type_byte() {
        assert!(FrameHeader::decode([255, 0, 0]).is_err());
    }

    #[test]
    fn max_payload_len_fits_the_u16_length_prefix() {
        assert_eq!(MAX_PAYLOAD_LEN, 65535);
        assert!(u16::try_from(MAX_PAYLOAD_LEN).is_ok());
        assert!(u16::try_from(MAX_PAYLOAD_LEN + 1).is_err());
    }
}
