//! Control-plane frame codec for the Roomcast TCP protocol.
//!
//! Requests and responses share one framing:
//!
//! ```text
//! offset 0:   1 byte  room_name_length (N)
//! offset 1:   1 byte  operation (1 = create, 2 = join; error responses use 0)
//! offset 2:   1 byte  reserved
//! offset 3:   4 bytes big-endian payload_length (M)
//! offset 7:   N bytes room name (UTF-8)
//! offset 7+N: M bytes payload (UTF-8 JSON)
//! ```
//!
//! The payload is a JSON object: [`AuthRequest`] on the way in,
//! [`ControlResponse`] on the way out.

use serde::{Deserialize, Serialize};

use crate::token::SessionToken;

/// Length of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 7;

/// Operation byte for a create-room request.
pub const OP_CREATE: u8 = 1;
/// Operation byte for a join-room request.
pub const OP_JOIN: u8 = 2;
/// Operation byte used by server error responses.
pub const OP_ERROR: u8 = 0;

/// Error type for control-frame encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Room name exceeds the 255 bytes the one-byte length field can carry.
    #[error("room name too long: {0} bytes (max 255)")]
    RoomNameTooLong(usize),

    /// The input ended before the frame was complete.
    #[error("frame truncated: need {needed} bytes, got {got}")]
    Truncated {
        /// Bytes required to complete the frame.
        needed: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// The room name bytes are not valid UTF-8.
    #[error("room name is not valid UTF-8")]
    RoomNameUtf8,

    /// The payload length field exceeds the caller's limit.
    #[error("payload length {len} exceeds limit {max}")]
    PayloadTooLarge {
        /// Declared payload length.
        len: usize,
        /// Maximum the caller accepts.
        max: usize,
    },

    /// The JSON payload could not be encoded or decoded.
    #[error("invalid payload: {0}")]
    Payload(String),
}

/// The fixed seven-byte header at the start of every control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Length of the room name that follows the header.
    pub name_len: u8,
    /// Operation byte ([`OP_CREATE`], [`OP_JOIN`], or [`OP_ERROR`]).
    pub op: u8,
    /// Reserved; always written as zero, ignored on read.
    pub reserved: u8,
    /// Length of the JSON payload that follows the room name.
    pub payload_len: u32,
}

impl FrameHeader {
    /// Parses a header from its wire representation.
    #[must_use]
    pub const fn decode(bytes: [u8; HEADER_LEN]) -> Self {
        Self {
            name_len: bytes[0],
            op: bytes[1],
            reserved: bytes[2],
            payload_len: u32::from_be_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
        }
    }

    /// Encodes the header into its wire representation.
    #[must_use]
    pub const fn encode(self) -> [u8; HEADER_LEN] {
        let len = self.payload_len.to_be_bytes();
        [
            self.name_len,
            self.op,
            self.reserved,
            len[0],
            len[1],
            len[2],
            len[3],
        ]
    }
}

/// A complete control frame: room name, operation, and raw JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    /// Room the operation targets (echoed back in responses).
    pub room: String,
    /// Operation byte.
    pub op: u8,
    /// Raw JSON payload bytes.
    pub payload: Vec<u8>,
}

impl ControlFrame {
    /// Encodes the frame into wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::RoomNameTooLong`] if the room name exceeds
    /// 255 bytes, or [`FrameError::PayloadTooLarge`] if the payload exceeds
    /// what the four-byte length field can carry.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let name = self.room.as_bytes();
        let name_len =
            u8::try_from(name.len()).map_err(|_| FrameError::RoomNameTooLong(name.len()))?;
        let payload_len =
            u32::try_from(self.payload.len()).map_err(|_| FrameError::PayloadTooLarge {
                len: self.payload.len(),
                max: u32::MAX as usize,
            })?;

        let header = FrameHeader {
            name_len,
            op: self.op,
            reserved: 0,
            payload_len,
        };

        let mut frame = Vec::with_capacity(HEADER_LEN + name.len() + self.payload.len());
        frame.extend_from_slice(&header.encode());
        frame.extend_from_slice(name);
        frame.extend_from_slice(&self.payload);
        Ok(frame)
    }

    /// Decodes a frame from a byte buffer, returning the frame and the
    /// number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Truncated`] if the buffer ends before the
    /// lengths declared in the header, or [`FrameError::RoomNameUtf8`] if
    /// the room name is not valid UTF-8.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::Truncated {
                needed: HEADER_LEN,
                got: bytes.len(),
            });
        }
        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&bytes[..HEADER_LEN]);
        let header = FrameHeader::decode(header_bytes);

        let name_end = HEADER_LEN + header.name_len as usize;
        let total = name_end + header.payload_len as usize;
        if bytes.len() < total {
            return Err(FrameError::Truncated {
                needed: total,
                got: bytes.len(),
            });
        }

        let room = std::str::from_utf8(&bytes[HEADER_LEN..name_end])
            .map_err(|_| FrameError::RoomNameUtf8)?
            .to_string();
        let payload = bytes[name_end..total].to_vec();

        Ok((
            Self {
                room,
                op: header.op,
                payload,
            },
            total,
        ))
    }
}

/// Create/join request payload carried in a control frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Display name attached to relayed messages.
    pub username: String,
    /// Room password, in the clear on the control channel.
    pub password: String,
    /// UDP port the client will send and receive datagrams on.
    pub udp_port: u16,
}

impl AuthRequest {
    /// Serializes the request to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Payload`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        serde_json::to_vec(self).map_err(|e| FrameError::Payload(e.to_string()))
    }

    /// Parses a request from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Payload`] if the bytes are not a valid request.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        serde_json::from_slice(bytes).map_err(|e| FrameError::Payload(e.to_string()))
    }
}

/// Response payload carried in a control frame.
///
/// Wire shape: `{"status":"ok","token":...}` on success,
/// `{"status":"error","message":...}` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ControlResponse {
    /// Operation succeeded; the token is the caller's membership credential.
    Ok {
        /// Newly minted session token.
        token: SessionToken,
    },
    /// Operation failed.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ControlResponse {
    /// Serializes the response to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Payload`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        serde_json::to_vec(self).map_err(|e| FrameError::Payload(e.to_string()))
    }

    /// Parses a response from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Payload`] if the bytes are not a valid response.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        serde_json::from_slice(bytes).map_err(|e| FrameError::Payload(e.to_string()))
    }
}
