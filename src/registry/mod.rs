//! Room registry
//!
//! Owns which peers are in which room, and which connection stands for which
//! peer. The registry never owns a connection; it keeps a [`PeerHandle`] per
//! member and a reverse index from [`ConnectionId`] to identity.
//!
//! # Layout
//!
//! ```text
//!                    Arc<RoomRegistry>
//!               ┌──────────────────────────────┐
//!               │ RwLock<RegistryState> {      │
//!               │   rooms: RoomId → Room {     │
//!               │     PeerId → PeerHandle      │
//!               │   }                          │
//!               │   bindings: ConnectionId →   │
//!               │     (RoomId, PeerId)         │
//!               │ }                            │
//!               └──────────────────────────────┘
//! ```
//!
//! A room exists exactly while it has at least one member, and every member
//! has exactly one binding. Both hold whenever the lock is released.

pub mod error;
pub mod handle;
pub mod room;
pub mod store;

pub use error::RegistryError;
pub use handle::{ConnectionClosed, ConnectionId, Outbound, PeerHandle};
pub use room::{PeerId, Room, RoomId};
pub use store::{RegistryState, RegistryStats, RoomRegistry};
