//! WebRTC signaling relay
//!
//! A rendezvous server for peers that want to open a direct peer-to-peer
//! connection. The relay never carries media; it only introduces peers that
//! share a room and forwards their handshake messages (SDP offers/answers and
//! ICE candidates) to the addressed peer.
//!
//! # Architecture
//!
//! ```text
//!   WebSocket conn ──► Connection worker ──► Router ──► RoomRegistry
//!        ▲               (reader loop)         │         rooms: RoomId → Room { PeerId → PeerHandle }
//!        │                                     │         bindings: ConnectionId → (RoomId, PeerId)
//!        └──── writer task ◄── PeerHandle ◄────┘
//! ```
//!
//! # Wire protocol
//!
//! JSON objects in WebSocket text frames. Every client message carries
//! `type`, `senderId` and `roomId`:
//!
//! - `join` - enter a room; existing members and the newcomer are told about each other
//! - `offer` / `answer` / `candidate` - forwarded verbatim to `receiverId`
//! - `leave` - exit the room; remaining members are notified
//!
//! Failures come back as `{"type":"error","message":..,"senderId":"server"}`.
//!
//! # Example
//!
//! ```no_run
//! use signal_relay::{ServerConfig, SignalServer};
//!
//! # async fn run() -> signal_relay::Result<()> {
//! let config = ServerConfig::default().bind("127.0.0.1:8080".parse().unwrap());
//! SignalServer::new(config).run().await
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use protocol::{Rejection, ServerMessage, SignalMessage};
pub use registry::{ConnectionId, PeerHandle, PeerId, RoomId, RoomRegistry};
pub use router::Router;
pub use server::{ServerConfig, SignalServer};
pub use stats::{RelayStats, RelayStatsSnapshot};
