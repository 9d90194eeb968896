//! Data-plane wire types for the Roomcast UDP channel.
//!
//! Inbound datagrams carry `{"token":..., "message":...}`; the relay
//! re-wraps them as `{"username":..., "message":...}` before fan-out, since
//! recipients never learn the sender's identity any other way. Malformed
//! datagrams are dropped — the data channel has no error-response path.

use serde::{Deserialize, Serialize};

use crate::token::SessionToken;

/// Maximum datagram size either side will send or buffer.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Error produced when a UDP payload cannot be encoded or decoded.
#[derive(Debug, thiserror::Error)]
#[error("invalid datagram: {0}")]
pub struct DatagramError(String);

/// An inbound chat datagram from a client to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDatagram {
    /// Bearer credential identifying the sender's session and room.
    pub token: SessionToken,
    /// The chat message text.
    pub message: String,
}

impl ChatDatagram {
    /// Serializes the datagram to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DatagramError`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DatagramError> {
        serde_json::to_vec(self).map_err(|e| DatagramError(e.to_string()))
    }

    /// Parses an inbound datagram from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DatagramError`] if the bytes are not a valid datagram.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatagramError> {
        serde_json::from_slice(bytes).map_err(|e| DatagramError(e.to_string()))
    }
}

/// A chat message as delivered to room members, with sender identity
/// attached by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayedChat {
    /// Display name of the sender (or `"server"` for server notices).
    pub username: String,
    /// The chat message text.
    pub message: String,
}

impl RelayedChat {
    /// Serializes the relayed message to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DatagramError`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DatagramError> {
        serde_json::to_vec(self).map_err(|e| DatagramError(e.to_string()))
    }

    /// Parses a relayed message from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DatagramError`] if the bytes are not a valid relayed message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatagramError> {
        serde_json::from_slice(bytes).map_err(|e| DatagramError(e.to_string()))
    }
}
