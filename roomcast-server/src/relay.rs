//! UDP relay loop: token-addressed chat fan-out.
//!
//! A single event-driven receive loop handles every datagram in turn:
//! rate-limit and length checks first, then JSON parse, then a registry
//! `touch` (which rewrites the sender's known endpoint — this is what lets
//! sessions ride out NAT rebinding), then fan-out of the re-wrapped message
//! to every other room member with a known endpoint.
//!
//! The data channel has no reverse acknowledgement path: malformed or
//! unauthorized datagrams are logged and dropped, never answered. A failed
//! send to one member never aborts delivery to the rest.
//!
//! The token is the only data-plane credential, and any datagram carrying it
//! redirects the session's endpoint. That is deliberate: the deployment
//! model trusts the local network, and the password gate lives on the
//! control plane.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use roomcast_proto::data::{ChatDatagram, MAX_DATAGRAM_SIZE, RelayedChat};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::registry::RoomRegistry;

/// Cap on distinct endpoints the rate limiter tracks before pruning.
const MAX_TRACKED_ENDPOINTS: usize = 4096;

/// Limits applied to inbound datagrams before any registry work.
#[derive(Debug, Clone)]
pub struct RelayLimits {
    /// Maximum chat message length in bytes.
    pub max_message_len: usize,
    /// Length of the rate-limit window.
    pub rate_window: Duration,
    /// Datagrams accepted per endpoint per window.
    pub max_per_window: u32,
}

impl Default for RelayLimits {
    fn default() -> Self {
        Self {
            max_message_len: 1024,
            rate_window: Duration::from_secs(1),
            max_per_window: 5,
        }
    }
}

/// Spawns the relay receive loop on the given socket.
pub fn spawn(
    socket: Arc<UdpSocket>,
    registry: Arc<RoomRegistry>,
    limits: RelayLimits,
) -> JoinHandle<()> {
    tokio::spawn(receive_loop(socket, registry, limits))
}

async fn receive_loop(socket: Arc<UdpSocket>, registry: Arc<RoomRegistry>, limits: RelayLimits) {
    let mut limiter = RateLimiter::new(limits.rate_window, limits.max_per_window);
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, peer)) => {
                if !limiter.allow(peer, Instant::now()) {
                    tracing::debug!(peer = %peer, "rate limit exceeded, datagram dropped");
                    continue;
                }
                handle_datagram(&socket, &registry, &limits, &buf[..len], peer).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "udp receive failed");
            }
        }
    }
}

/// Processes one inbound datagram end to end.
async fn handle_datagram(
    socket: &UdpSocket,
    registry: &RoomRegistry,
    limits: &RelayLimits,
    bytes: &[u8],
    peer: SocketAddr,
) {
    let datagram = match ChatDatagram::from_bytes(bytes) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "malformed datagram dropped");
            return;
        }
    };

    if datagram.message.len() > limits.max_message_len {
        tracing::warn!(
            peer = %peer,
            len = datagram.message.len(),
            max = limits.max_message_len,
            "over-length message dropped"
        );
        return;
    }

    // Learn (or re-learn) the sender's endpoint before routing.
    if registry.touch(&datagram.token, peer).await.is_err() {
        tracing::warn!(peer = %peer, "datagram with unknown token dropped");
        return;
    }

    let Some(username) = registry.session_username(&datagram.token).await else {
        return;
    };
    let Ok(members) = registry.members_of(&datagram.token).await else {
        return;
    };

    let relayed = RelayedChat {
        username,
        message: datagram.message,
    };
    let out = match relayed.to_bytes() {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode relayed message");
            return;
        }
    };

    let mut delivered = 0usize;
    for member in &members {
        if *member == datagram.token {
            continue;
        }
        let Some(endpoint) = registry.session_endpoint(member).await else {
            // Evicted member; reinstated on its next datagram.
            continue;
        };
        // Best effort: a failed send must not starve the remaining members.
        if let Err(e) = socket.send_to(&out, endpoint).await {
            tracing::warn!(endpoint = %endpoint, error = %e, "relay send failed");
        } else {
            delivered += 1;
        }
    }

    tracing::debug!(
        peer = %peer,
        username = %relayed.username,
        members = members.len(),
        delivered = delivered,
        "datagram relayed"
    );
}

/// Per-endpoint sliding rate limiter, one entry per sending endpoint.
///
/// An endpoint gets `max_per_window` datagrams per window; each accepted
/// datagram slides the window forward. The table is pruned of stale entries
/// once it grows past [`MAX_TRACKED_ENDPOINTS`].
#[derive(Debug)]
struct RateLimiter {
    window: Duration,
    max_per_window: u32,
    entries: HashMap<SocketAddr, (Instant, u32)>,
}

impl RateLimiter {
    fn new(window: Duration, max_per_window: u32) -> Self {
        Self {
            window,
            max_per_window,
            entries: HashMap::new(),
        }
    }

    /// Returns whether a datagram from `peer` at `now` is within its budget.
    fn allow(&mut self, peer: SocketAddr, now: Instant) -> bool {
        if self.entries.len() >= MAX_TRACKED_ENDPOINTS {
            let window = self.window;
            self.entries
                .retain(|_, (last, _)| now.duration_since(*last) < window);
        }

        let updated = match self.entries.get(&peer) {
            Some(&(last, count)) if now.duration_since(last) < self.window => {
                if count >= self.max_per_window {
                    return false;
                }
                (now, count + 1)
            }
            _ => (now, 1),
        };
        self.entries.insert(peer, updated);
        true
    }
}
