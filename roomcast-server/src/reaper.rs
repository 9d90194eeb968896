//! Inactivity reaper: bounds idle endpoint-tracking state.
//!
//! Runs on a fixed period equal to the inactivity timeout. Each cycle
//! collects sessions whose last-seen time is older than the timeout, sends
//! each endpoint a single best-effort notice, and clears its liveness
//! record. Room membership is untouched — the token comes back as newly
//! touched on its next datagram. This is housekeeping, not access control.

use std::sync::Arc;
use std::time::Duration;

use roomcast_proto::data::RelayedChat;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::RoomRegistry;

/// Username the eviction notice is attributed to.
const NOTICE_USERNAME: &str = "server";

/// Message text of the eviction notice.
const NOTICE_MESSAGE: &str = "disconnected due to inactivity";

/// Spawns the reaper task, scanning once per `timeout` period.
pub fn spawn(
    socket: Arc<UdpSocket>,
    registry: Arc<RoomRegistry>,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(timeout);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so scans start one
        // full period after startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            reap_idle(&socket, &registry, timeout).await;
        }
    })
}

/// One reaper cycle: notify and evict every session idle past `timeout`.
async fn reap_idle(socket: &UdpSocket, registry: &RoomRegistry, timeout: Duration) {
    let idle = registry.idle_sessions(timeout).await;
    if idle.is_empty() {
        return;
    }

    let notice = RelayedChat {
        username: NOTICE_USERNAME.to_string(),
        message: NOTICE_MESSAGE.to_string(),
    };
    let bytes = match notice.to_bytes() {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode eviction notice");
            return;
        }
    };

    for (token, endpoint) in idle {
        if let Err(e) = socket.send_to(&bytes, endpoint).await {
            tracing::warn!(endpoint = %endpoint, error = %e, "eviction notice send failed");
        }
        registry.evict(&token).await;
        tracing::info!(endpoint = %endpoint, "endpoint evicted for inactivity");
    }
}
