//! Inactivity eviction through the full stack: the reaper notifies a silent
//! endpoint exactly once, and a later datagram reinstates the session.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use roomcast_proto::data::{ChatDatagram, MAX_DATAGRAM_SIZE, RelayedChat};
use roomcast_server::registry::RoomRegistry;
use roomcast_server::relay::RelayLimits;
use roomcast_server::{reaper, relay};
use tokio::net::UdpSocket;

const IDLE_TIMEOUT: Duration = Duration::from_millis(300);

#[tokio::test]
async fn silent_endpoint_is_notified_once_then_reinstated_on_next_datagram() {
    let registry = Arc::new(RoomRegistry::new());
    let server_udp = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let server_addr = server_udp.local_addr().unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let token = registry
        .create_room("lobby", "pw", "alice", client.local_addr().unwrap())
        .await
        .unwrap();

    let _relay = relay::spawn(
        Arc::clone(&server_udp),
        Arc::clone(&registry),
        RelayLimits::default(),
    );
    let _reaper = reaper::spawn(Arc::clone(&server_udp), Arc::clone(&registry), IDLE_TIMEOUT);

    // Stay silent past the timeout: exactly one eviction notice arrives.
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let (len, from) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("expected an eviction notice")
        .unwrap();
    assert_eq!(from, server_addr);
    let notice = RelayedChat::from_bytes(&buf[..len]).unwrap();
    assert_eq!(notice.username, "server");
    assert_eq!(notice.message, "disconnected due to inactivity");

    assert_eq!(registry.session_endpoint(&token).await, None);

    // No second notice for an already-evicted session.
    let silent = tokio::time::timeout(
        IDLE_TIMEOUT + Duration::from_millis(200),
        client.recv_from(&mut buf),
    )
    .await;
    assert!(silent.is_err(), "evicted endpoint must be notified only once");

    // A datagram from the evicted token reinstates its liveness record.
    let datagram = ChatDatagram {
        token: token.clone(),
        message: "back".to_string(),
    };
    client
        .send_to(&datagram.to_bytes().unwrap(), server_addr)
        .await
        .unwrap();

    // Wait until the relay loop has processed the datagram.
    let mut reinstated = false;
    for _ in 0..20 {
        if registry.session_endpoint(&token).await == Some(client.local_addr().unwrap()) {
            reinstated = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(reinstated, "datagram after eviction must reinstate the session");
}

#[tokio::test]
async fn active_endpoint_survives_reaper_cycles() {
    let registry = Arc::new(RoomRegistry::new());
    let server_udp = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let server_addr = server_udp.local_addr().unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let token = registry
        .create_room("lobby", "pw", "alice", client.local_addr().unwrap())
        .await
        .unwrap();

    // Generous rate budget so every keep-alive ping lands a touch.
    let limits = RelayLimits {
        max_per_window: 100,
        ..RelayLimits::default()
    };
    let _relay = relay::spawn(Arc::clone(&server_udp), Arc::clone(&registry), limits);
    let _reaper = reaper::spawn(Arc::clone(&server_udp), Arc::clone(&registry), IDLE_TIMEOUT);

    // Keep chattering faster than the timeout across several reaper cycles.
    for _ in 0..6 {
        let datagram = ChatDatagram {
            token: token.clone(),
            message: "ping".to_string(),
        };
        client
            .send_to(&datagram.to_bytes().unwrap(), server_addr)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert!(
        registry.session_endpoint(&token).await.is_some(),
        "an active endpoint must not be evicted"
    );
}
