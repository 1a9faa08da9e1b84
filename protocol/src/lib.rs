//! Wire protocol shared between `netrek-server` and `netrek-client`.
//!
//! Frames are `u8` message type || `u16` big-endian payload length || payload
//! bytes, where the payload is UTF-8 JSON. This crate owns the frame header
//! constants, the [`MessageType`] tag, the JSON payload shapes, and the small
//! value types (`Vector2D`, `Collider`) shared by the simulation and the wire
//! format. It has no networking or simulation dependency of its own.

pub mod frame;
pub mod messages;
pub mod types;

pub use frame::{FrameDecodeError, FrameHeader, MessageType, FRAME_HEADER_LEN, MAX_PAYLOAD_LEN};
pub use messages::*;
pub use types::{Collider, Vector2D};
