//! TCP control-plane server: framed create/join requests.
//!
//! Each accepted connection carries exactly one request/response exchange
//! and is then closed by the server, whatever the outcome. The per-connection
//! state machine is read header → read room name → read payload → dispatch →
//! respond and close. Parse failures get a framed error response; a
//! connection that sends zero bytes is closed with no response. Nothing here
//! is fatal to the accept loop.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use roomcast_proto::control::{
    AuthRequest, ControlFrame, ControlResponse, FrameError, FrameHeader, HEADER_LEN, OP_CREATE,
    OP_ERROR, OP_JOIN,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::registry::RoomRegistry;

/// Maximum username length in bytes accepted on create/join.
const MAX_USERNAME_LEN: usize = 255;

/// Failure while reading a control request off the stream.
#[derive(Debug, thiserror::Error)]
enum RequestError {
    /// The frame itself was malformed; the client gets an error response.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// The transport failed; nothing useful can be sent back.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Binds the control-plane listener and spawns the accept loop.
///
/// Returns the bound address (useful when binding port 0 in tests) and the
/// accept-loop task handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start(
    addr: &str,
    registry: Arc<RoomRegistry>,
    max_payload_size: usize,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    let handle = tokio::spawn(accept_loop(listener, registry, max_payload_size));
    Ok((bound, handle))
}

async fn accept_loop(listener: TcpListener, registry: Arc<RoomRegistry>, max_payload_size: usize) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                // One bounded-lifetime task per connection: a single
                // request/response, then the stream closes.
                let registry = Arc::clone(&registry);
                tokio::spawn(handle_connection(stream, peer, registry, max_payload_size));
            }
            Err(e) => {
                tracing::warn!(error = %e, "control accept failed");
            }
        }
    }
}

/// Drives one connection through its single request/response exchange.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<RoomRegistry>,
    max_payload_size: usize,
) {
    let response = match read_request(&mut stream, max_payload_size).await {
        Ok(Some(frame)) => {
            tracing::debug!(peer = %peer, room = %frame.room, op = frame.op, "control request");
            dispatch(&registry, &frame, peer.ip()).await
        }
        Ok(None) => {
            tracing::debug!(peer = %peer, "connection closed without a request");
            return;
        }
        Err(RequestError::Io(e)) => {
            tracing::warn!(peer = %peer, error = %e, "control read failed");
            return;
        }
        Err(RequestError::Frame(e)) => {
            tracing::warn!(peer = %peer, error = %e, "malformed control frame");
            error_frame("", e.to_string())
        }
    };

    if let Err(e) = write_response(&mut stream, &response).await {
        tracing::warn!(peer = %peer, error = %e, "failed to send control response");
    }
}

/// Reads one framed request: fixed header, then room name, then payload.
///
/// Returns `Ok(None)` if the peer closed the connection before sending any
/// bytes — that case gets no response. A stream that ends mid-frame maps to
/// [`FrameError::Truncated`] so the caller can answer with an error frame.
async fn read_request<S: AsyncRead + Unpin>(
    stream: &mut S,
    max_payload_size: usize,
) -> Result<Option<ControlFrame>, RequestError> {
    let mut header_bytes = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = stream.read(&mut header_bytes[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrameError::Truncated {
                needed: HEADER_LEN,
                got: filled,
            }
            .into());
        }
        filled += n;
    }
    let header = FrameHeader::decode(header_bytes);

    let payload_len = header.payload_len as usize;
    if payload_len > max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            len: payload_len,
            max: max_payload_size,
        }
        .into());
    }

    let total = HEADER_LEN + header.name_len as usize + payload_len;

    let mut name_bytes = vec![0u8; header.name_len as usize];
    read_body(stream, &mut name_bytes, total).await?;
    let room = String::from_utf8(name_bytes).map_err(|_| FrameError::RoomNameUtf8)?;

    let mut payload = vec![0u8; payload_len];
    read_body(stream, &mut payload, total).await?;

    Ok(Some(ControlFrame {
        room,
        op: header.op,
        payload,
    }))
}

/// `read_exact` with early EOF reported as a truncated frame.
async fn read_body<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut [u8],
    frame_total: usize,
) -> Result<(), RequestError> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(FrameError::Truncated {
            needed: frame_total,
            got: HEADER_LEN,
        }
        .into()),
        Err(e) => Err(e.into()),
    }
}

/// Maps a parsed request onto a registry operation and builds the response
/// frame. The joiner's initial UDP endpoint is the connection's peer IP
/// paired with the `udp_port` it declared in the payload.
async fn dispatch(registry: &RoomRegistry, frame: &ControlFrame, peer_ip: IpAddr) -> ControlFrame {
    let request = match AuthRequest::from_bytes(&frame.payload) {
        Ok(r) => r,
        Err(e) => return error_frame(&frame.room, e.to_string()),
    };

    if request.username.is_empty() || request.username.len() > MAX_USERNAME_LEN {
        return error_frame(
            &frame.room,
            format!("username must be 1-{MAX_USERNAME_LEN} bytes"),
        );
    }

    let endpoint = SocketAddr::new(peer_ip, request.udp_port);
    let result = match frame.op {
        OP_CREATE => {
            registry
                .create_room(&frame.room, &request.password, &request.username, endpoint)
                .await
        }
        OP_JOIN => {
            registry
                .join_room(&frame.room, &request.password, &request.username, endpoint)
                .await
        }
        other => {
            return error_frame(&frame.room, format!("unknown operation {other}"));
        }
    };

    match result {
        Ok(token) => {
            tracing::info!(room = %frame.room, username = %request.username, "session granted");
            match (ControlResponse::Ok { token }).to_bytes() {
                Ok(payload) => ControlFrame {
                    room: frame.room.clone(),
                    op: frame.op,
                    payload,
                },
                Err(e) => error_frame(&frame.room, e.to_string()),
            }
        }
        Err(e) => {
            tracing::info!(room = %frame.room, error = %e, "control request refused");
            error_frame(&frame.room, e.to_string())
        }
    }
}

/// Builds an error response frame (operation byte 0) echoing the room name.
fn error_frame(room: &str, message: String) -> ControlFrame {
    // Serializing a string-only struct cannot fail in practice.
    let payload = (ControlResponse::Error { message })
        .to_bytes()
        .unwrap_or_default();
    ControlFrame {
        room: room.to_string(),
        op: OP_ERROR,
        payload,
    }
}

async fn write_response<S: AsyncWrite + Unpin>(
    stream: &mut S,
    frame: &ControlFrame,
) -> Result<(), RequestError> {
    let bytes = frame.encode()?;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;
    Ok(())
}
