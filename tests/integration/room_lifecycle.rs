//! Control-plane behavior over a real TCP connection: create/join outcomes,
//! error responses for malformed traffic, and the silent close on empty
//! connections.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;

use roomcast_proto::control::{
    AuthRequest, ControlFrame, ControlResponse, OP_CREATE, OP_ERROR, OP_JOIN,
};
use roomcast_server::control;
use roomcast_server::registry::RoomRegistry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start_control() -> SocketAddr {
    let registry = Arc::new(RoomRegistry::new());
    let (addr, _handle) = control::start("127.0.0.1:0", registry, 64 * 1024)
        .await
        .unwrap();
    addr
}

async fn control_request(
    addr: SocketAddr,
    room: &str,
    op: u8,
    username: &str,
    password: &str,
    udp_port: u16,
) -> ControlFrame {
    let frame = ControlFrame {
        room: room.to_string(),
        op,
        payload: AuthRequest {
            username: username.to_string(),
            password: password.to_string(),
            udp_port,
        }
        .to_bytes()
        .unwrap(),
    };
    send_raw(addr, &frame.encode().unwrap()).await
}

/// Writes raw bytes and decodes whatever single frame comes back.
async fn send_raw(addr: SocketAddr, bytes: &[u8]) -> ControlFrame {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(bytes).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let (response, _) = ControlFrame::decode(&buf).unwrap();
    response
}

fn error_message(response: &ControlFrame) -> String {
    assert_eq!(response.op, OP_ERROR);
    match ControlResponse::from_bytes(&response.payload).unwrap() {
        ControlResponse::Error { message } => message,
        ControlResponse::Ok { .. } => panic!("expected error response"),
    }
}

#[tokio::test]
async fn create_succeeds_once_then_conflicts() {
    let addr = start_control().await;

    let first = control_request(addr, "lobby", OP_CREATE, "alice", "pw", 4000).await;
    assert_eq!(first.op, OP_CREATE);
    assert!(matches!(
        ControlResponse::from_bytes(&first.payload).unwrap(),
        ControlResponse::Ok { .. }
    ));

    let second = control_request(addr, "lobby", OP_CREATE, "bob", "pw", 4001).await;
    assert_eq!(error_message(&second), "room already exists");
}

#[tokio::test]
async fn join_wrong_password_is_refused() {
    let addr = start_control().await;
    control_request(addr, "lobby", OP_CREATE, "alice", "pw", 4000).await;

    let join = control_request(addr, "lobby", OP_JOIN, "bob", "wrong", 4001).await;
    assert_eq!(error_message(&join), "incorrect password");
}

#[tokio::test]
async fn join_missing_room_is_refused() {
    let addr = start_control().await;

    let join = control_request(addr, "nowhere", OP_JOIN, "bob", "pw", 4001).await;
    assert_eq!(error_message(&join), "no such room");
}

#[tokio::test]
async fn create_and_join_tokens_differ() {
    let addr = start_control().await;

    let create = control_request(addr, "lobby", OP_CREATE, "alice", "pw", 4000).await;
    let join = control_request(addr, "lobby", OP_JOIN, "bob", "pw", 4001).await;

    let token_a = match ControlResponse::from_bytes(&create.payload).unwrap() {
        ControlResponse::Ok { token } => token,
        ControlResponse::Error { message } => panic!("create failed: {message}"),
    };
    let token_b = match ControlResponse::from_bytes(&join.payload).unwrap() {
        ControlResponse::Ok { token } => token,
        ControlResponse::Error { message } => panic!("join failed: {message}"),
    };
    assert_ne!(token_a, token_b);
}

#[tokio::test]
async fn unknown_operation_gets_error_response() {
    let addr = start_control().await;

    let response = control_request(addr, "lobby", 9, "alice", "pw", 4000).await;
    assert!(error_message(&response).contains("unknown operation"));
}

#[tokio::test]
async fn invalid_json_payload_gets_error_response() {
    let addr = start_control().await;

    let frame = ControlFrame {
        room: "lobby".to_string(),
        op: OP_CREATE,
        payload: b"}{".to_vec(),
    };
    let response = send_raw(addr, &frame.encode().unwrap()).await;
    assert_eq!(response.op, OP_ERROR);
}

#[tokio::test]
async fn truncated_frame_gets_error_response() {
    let addr = start_control().await;

    // Three header bytes, then EOF.
    let response = send_raw(addr, &[5, 1, 0]).await;
    assert!(error_message(&response).contains("truncated"));
}

#[tokio::test]
async fn zero_byte_connection_closed_without_response() {
    let addr = start_control().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    assert!(buf.is_empty(), "server must not respond to an empty request");
}

#[tokio::test]
async fn connection_is_closed_after_response() {
    let addr = start_control().await;

    let frame = ControlFrame {
        room: "lobby".to_string(),
        op: OP_CREATE,
        payload: AuthRequest {
            username: "alice".to_string(),
            password: "pw".to_string(),
            udp_port: 4000,
        }
        .to_bytes()
        .unwrap(),
    };
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&frame.encode().unwrap()).await.unwrap();

    // read_to_end only returns once the server closes its side.
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    assert!(!buf.is_empty());
    let (response, consumed) = ControlFrame::decode(&buf).unwrap();
    assert_eq!(consumed, buf.len());
    assert_eq!(response.op, OP_CREATE);
}
