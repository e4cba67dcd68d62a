//! Session layer between WebSocket connections and matches.
//!
//! Connections become presences, presences meet in rooms, and each room
//! runs one task that ticks its match and streams snapshots until the
//! match ends.

pub mod presence;
pub mod rendezvous;
pub mod room;
pub mod service;

pub use service::{GatewayError, GatewaySettings, SessionGateway};
