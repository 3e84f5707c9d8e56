//! Registry error types
//!
//! Outcomes of registry operations that did not apply. None of them are
//! fatal; the caller decides whether one is expected or worth reporting.

use thiserror::Error;

use super::handle::ConnectionId;
use super::room::{PeerId, RoomId};

/// Error type for registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Room does not exist
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// Peer is not a member of the room
    #[error("Peer '{1}' not found in room '{0}'")]
    PeerNotFound(RoomId, PeerId),

    /// Peer already holds a slot in the room
    #[error("Peer '{1}' already joined room '{0}'")]
    AlreadyMember(RoomId, PeerId),

    /// Connection is already bound to an identity
    #[error("Connection {connection} already bound to '{peer_id}' in room '{room_id}'")]
    ConnectionBound {
        connection: ConnectionId,
        room_id: RoomId,
        peer_id: PeerId,
    },
}
