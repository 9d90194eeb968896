//! Session tokens: the bearer credential minted by the control plane.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Number of characters in a generated token.
pub const TOKEN_LEN: usize = 24;

/// Opaque, unguessable credential tying a session to exactly one room.
///
/// Minted once at room-create or room-join time and never reused. The
/// alphabet is `[A-Za-z0-9]`, so collisions are astronomically unlikely;
/// the registry still re-generates on the impossible duplicate.
///
/// Serializes as a bare JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    /// Mints a fresh token from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let token = rand::rng()
            .sample_iter(Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Wraps an existing token string, e.g. one parsed off the wire.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
