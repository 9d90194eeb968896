//! Roomcast server library.
//!
//! Exposes the session broker and relay components for embedding and tests:
//! the room/session registry, the TCP control-plane server, the UDP relay
//! loop, and the inactivity reaper. The binary in `main.rs` wires them all
//! to one shared [`registry::RoomRegistry`].

pub mod config;
pub mod control;
pub mod reaper;
pub mod registry;
pub mod relay;
pub mod vault;
