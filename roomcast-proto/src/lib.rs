//! Shared wire-format definitions for the Roomcast protocol.
//!
//! The control plane (TCP) uses a fixed binary header followed by a UTF-8
//! room name and a JSON payload; the data plane (UDP) carries bare JSON
//! objects. Both sides of the wire depend on this crate.

pub mod control;
pub mod data;
pub mod token;
