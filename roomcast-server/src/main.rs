//! Roomcast server — room broker and chat datagram relay.
//!
//! Clients obtain a session token over TCP (create or join a room), then
//! exchange chat messages over UDP; the server fans each message out to the
//! other members of the sender's room.
//!
//! # Usage
//!
//! ```bash
//! # Run on the default ports (TCP 9091, UDP 9090)
//! cargo run --bin roomcast-server
//!
//! # Run on custom ports
//! cargo run --bin roomcast-server -- --host 127.0.0.1 -t 7001 -u 7002
//!
//! # Or via environment variables
//! ROOMCAST_TCP_PORT=7001 ROOMCAST_UDP_PORT=7002 cargo run --bin roomcast-server
//! ```

use std::sync::Arc;

use clap::Parser;
use roomcast_server::config::{ServerCliArgs, ServerConfig};
use roomcast_server::registry::RoomRegistry;
use roomcast_server::relay::RelayLimits;
use roomcast_server::{control, reaper, relay};
use tokio::net::UdpSocket;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        tcp = %config.tcp_addr(),
        udp = %config.udp_addr(),
        "starting roomcast server"
    );

    // One registry shared by the control plane, the relay, and the reaper.
    let registry = Arc::new(RoomRegistry::new());

    let udp_socket = match UdpSocket::bind(config.udp_addr()).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(addr = %config.udp_addr(), error = %e, "failed to bind UDP socket");
            std::process::exit(1);
        }
    };

    let (tcp_addr, control_handle) = match control::start(
        &config.tcp_addr(),
        Arc::clone(&registry),
        config.max_payload_size,
    )
    .await
    {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(addr = %config.tcp_addr(), error = %e, "failed to bind TCP listener");
            std::process::exit(1);
        }
    };

    tracing::info!(tcp = %tcp_addr, udp = %config.udp_addr(), "roomcast server listening");

    let limits = RelayLimits {
        max_message_len: config.max_message_len,
        rate_window: std::time::Duration::from_secs(1),
        max_per_window: config.rate_limit_per_sec,
    };
    let relay_handle = relay::spawn(Arc::clone(&udp_socket), Arc::clone(&registry), limits);
    let reaper_handle = reaper::spawn(udp_socket, registry, config.idle_timeout);

    // None of these tasks return in normal operation.
    tokio::select! {
        result = control_handle => {
            tracing::error!(result = ?result, "control server task exited");
        }
        result = relay_handle => {
            tracing::error!(result = ?result, "relay task exited");
        }
        result = reaper_handle => {
            tracing::error!(result = ?result, "reaper task exited");
        }
    }
    std::process::exit(1);
}
