//! In-memory room and session registry — the single source of truth for
//! routing decisions.
//!
//! Rooms map a unique name to a password record and a member list of session
//! tokens; every token maps back to exactly one room plus a mutable liveness
//! record (username, endpoint, last-seen). The control plane creates and
//! joins rooms, the relay loop touches and resolves sessions, and the reaper
//! clears liveness — all through one [`RwLock`], so every operation appears
//! atomic to concurrent callers.
//!
//! Rooms are never deleted and member lists only grow; the only lifecycle is
//! the reaper's liveness timeout, which clears a session's endpoint without
//! touching membership. State is lost on process exit by design.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use roomcast_proto::token::SessionToken;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::vault::PasswordRecord;

/// Maximum room-name length in bytes (the frame header's one-byte length
/// field cannot carry more, but the registry enforces it independently).
pub const MAX_ROOM_NAME_LEN: usize = 255;

/// Errors produced by registry operations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A room with that name already exists.
    #[error("room already exists")]
    RoomExists,
    /// The named room does not exist.
    #[error("no such room")]
    NoSuchRoom,
    /// The password did not verify against the room's stored digest.
    #[error("incorrect password")]
    BadPassword,
    /// The token is not registered to any session.
    #[error("unknown session token")]
    UnknownToken,
    /// The room name is empty or longer than [`MAX_ROOM_NAME_LEN`] bytes.
    #[error("room name must be 1-{MAX_ROOM_NAME_LEN} bytes")]
    InvalidRoomName,
}

/// A named room: password digest plus its member tokens.
#[derive(Debug)]
struct Room {
    password: PasswordRecord,
    members: Vec<SessionToken>,
}

/// Per-token session state. `endpoint` and `last_seen` form the liveness
/// record: cleared by eviction, reinstated by the next touch.
#[derive(Debug)]
struct Session {
    room: String,
    username: String,
    endpoint: Option<SocketAddr>,
    last_seen: Option<Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    rooms: HashMap<String, Room>,
    sessions: HashMap<SessionToken, Session>,
}

impl Inner {
    /// Mints a token guaranteed unused in this registry. Collisions are
    /// astronomically unlikely but re-generated anyway.
    fn mint_token(&self) -> SessionToken {
        loop {
            let token = SessionToken::generate();
            if !self.sessions.contains_key(&token) {
                return token;
            }
        }
    }
}

/// Thread-safe room/session registry shared by the control server, the
/// relay loop, and the reaper.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    inner: RwLock<Inner>,
}

impl RoomRegistry {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room and registers its creator as the first member.
    ///
    /// The initial endpoint is where relayed messages will be sent until the
    /// creator's first datagram overwrites it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidRoomName`] or
    /// [`RegistryError::RoomExists`].
    pub async fn create_room(
        &self,
        name: &str,
        password: &str,
        username: &str,
        endpoint: SocketAddr,
    ) -> Result<SessionToken, RegistryError> {
        validate_room_name(name)?;

        // The KDF is deliberately slow; run it before taking the lock. A
        // concurrent create for the same name just loses the insert race.
        let record = PasswordRecord::derive(password);

        let mut inner = self.inner.write().await;
        if inner.rooms.contains_key(name) {
            return Err(RegistryError::RoomExists);
        }

        let token = inner.mint_token();
        inner.rooms.insert(
            name.to_string(),
            Room {
                password: record,
                members: vec![token.clone()],
            },
        );
        inner.sessions.insert(
            token.clone(),
            Session {
                room: name.to_string(),
                username: username.to_string(),
                endpoint: Some(endpoint),
                last_seen: Some(Instant::now()),
            },
        );
        drop(inner);

        Ok(token)
    }

    /// Verifies the password and adds a new member to an existing room.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoSuchRoom`] or [`RegistryError::BadPassword`].
    pub async fn join_room(
        &self,
        name: &str,
        password: &str,
        username: &str,
        endpoint: SocketAddr,
    ) -> Result<SessionToken, RegistryError> {
        // Password records are immutable once stored, so verification can
        // run on a clone outside the lock.
        let record = {
            let inner = self.inner.read().await;
            inner
                .rooms
                .get(name)
                .ok_or(RegistryError::NoSuchRoom)?
                .password
                .clone()
        };
        if !record.verify(password) {
            return Err(RegistryError::BadPassword);
        }

        let mut guard = self.inner.write().await;
        let token = guard.mint_token();
        let inner = &mut *guard;
        let room = inner
            .rooms
            .get_mut(name)
            .ok_or(RegistryError::NoSuchRoom)?;
        room.members.push(token.clone());
        inner.sessions.insert(
            token.clone(),
            Session {
                room: name.to_string(),
                username: username.to_string(),
                endpoint: Some(endpoint),
                last_seen: Some(Instant::now()),
            },
        );
        drop(guard);

        Ok(token)
    }

    /// Returns every member token of the room the given token belongs to,
    /// including the token itself.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownToken`].
    pub async fn members_of(&self, token: &SessionToken) -> Result<Vec<SessionToken>, RegistryError> {
        let inner = self.inner.read().await;
        let session = inner
            .sessions
            .get(token)
            .ok_or(RegistryError::UnknownToken)?;
        let room = inner
            .rooms
            .get(&session.room)
            .ok_or(RegistryError::UnknownToken)?;
        Ok(room.members.clone())
    }

    /// Overwrites the token's endpoint and refreshes its last-seen time.
    ///
    /// Called on every inbound relay datagram; this is what lets sessions
    /// survive NAT rebinding and ephemeral-port changes, and what reinstates
    /// an evicted session.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownToken`].
    pub async fn touch(
        &self,
        token: &SessionToken,
        endpoint: SocketAddr,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(token)
            .ok_or(RegistryError::UnknownToken)?;
        session.endpoint = Some(endpoint);
        session.last_seen = Some(Instant::now());
        Ok(())
    }

    /// Clears the token's liveness record (endpoint and last-seen).
    ///
    /// Room membership is untouched: the token can come back and will be
    /// treated as newly touched on its next datagram. Unknown tokens are
    /// ignored.
    pub async fn evict(&self, token: &SessionToken) {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.sessions.get_mut(token) {
            session.endpoint = None;
            session.last_seen = None;
        }
    }

    /// Returns the token's current endpoint, if it has a liveness record.
    pub async fn session_endpoint(&self, token: &SessionToken) -> Option<SocketAddr> {
        let inner = self.inner.read().await;
        inner.sessions.get(token).and_then(|s| s.endpoint)
    }

    /// Returns the username recorded for the token at create/join time.
    pub async fn session_username(&self, token: &SessionToken) -> Option<String> {
        let inner = self.inner.read().await;
        inner.sessions.get(token).map(|s| s.username.clone())
    }

    /// Returns every session whose last-seen time is older than `timeout`,
    /// with its current endpoint. Used by the reaper.
    pub async fn idle_sessions(&self, timeout: Duration) -> Vec<(SessionToken, SocketAddr)> {
        let now = Instant::now();
        let inner = self.inner.read().await;
        inner
            .sessions
            .iter()
            .filter_map(|(token, session)| {
                let last_seen = session.last_seen?;
                let endpoint = session.endpoint?;
                (now.duration_since(last_seen) > timeout).then(|| (token.clone(), endpoint))
            })
            .collect()
    }
}

fn validate_room_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() || name.len() > MAX_ROOM_NAME_LEN {
        return Err(RegistryError::InvalidRoomName);
    }
    Ok(())
}
