//! Room registry implementation
//!
//! The single owner of room membership and of the connection-to-identity
//! index. All state sits behind one `RwLock`; multi-step sequences (join,
//! leave) hold the write guard for their whole duration.

use std::collections::HashMap;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::RegistryError;
use super::handle::{ConnectionId, PeerHandle};
use super::room::{PeerId, RoomId, Room};

/// Central registry of rooms and their members
///
/// Created once per server and shared by every connection worker.
pub struct RoomRegistry {
    state: RwLock<RegistryState>,
}

impl RoomRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Shared access for lookups and relaying
    pub async fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().await
    }

    /// Exclusive access for membership changes
    pub async fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().await
    }

    /// Snapshot of registry counters
    pub async fn stats(&self) -> RegistryStats {
        self.state.read().await.stats()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Rooms currently present
    pub rooms: usize,
    /// Members across all rooms
    pub members: usize,
    /// Connection-to-identity entries
    pub bindings: usize,
}

/// Locked registry state
///
/// Reached only through [`RoomRegistry::read`] and [`RoomRegistry::write`].
#[derive(Debug, Default)]
pub struct RegistryState {
    rooms: HashMap<RoomId, Room>,
    bindings: HashMap<ConnectionId, (RoomId, PeerId)>,
}

impl RegistryState {
    /// Create a room unless it already exists
    ///
    /// A room created here must receive a member before the write guard is
    /// released, or be dropped again by [`remove_member`](Self::remove_member).
    pub fn create_room_if_absent(&mut self, room_id: &RoomId) {
        if !self.rooms.contains_key(room_id) {
            self.rooms.insert(room_id.clone(), Room::new());
            tracing::info!(room = %room_id, "Room created");
        }
    }

    /// Check whether a peer holds a slot in a room
    pub fn is_member(&self, room_id: &RoomId, peer_id: &PeerId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|room| room.contains(peer_id))
    }

    /// Add a member and bind its connection to the new identity
    pub fn add_member(
        &mut self,
        room_id: &RoomId,
        peer_id: &PeerId,
        handle: PeerHandle,
    ) -> Result<(), RegistryError> {
        if let Some((bound_room, bound_peer)) = self.bindings.get(&handle.id()) {
            return Err(RegistryError::ConnectionBound {
                connection: handle.id(),
                room_id: bound_room.clone(),
                peer_id: bound_peer.clone(),
            });
        }
        if self.is_member(room_id, peer_id) {
            return Err(RegistryError::AlreadyMember(
                room_id.clone(),
                peer_id.clone(),
            ));
        }

        let connection = handle.id();
        let room = self.rooms.entry(room_id.clone()).or_insert_with(Room::new);
        room.insert(peer_id.clone(), handle);
        self.bindings
            .insert(connection, (room_id.clone(), peer_id.clone()));

        tracing::info!(
            room = %room_id,
            peer = %peer_id,
            connection = %connection,
            members = room.len(),
            "Peer joined"
        );

        Ok(())
    }

    /// Members of a room in join order
    pub fn members(&self, room_id: &RoomId) -> Result<Vec<(PeerId, PeerHandle)>, RegistryError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.clone()))?;

        Ok(room
            .iter()
            .map(|(peer, handle)| (peer.clone(), handle.clone()))
            .collect())
    }

    /// Look up a single member's connection
    pub fn member(&self, room_id: &RoomId, peer_id: &PeerId) -> Result<&PeerHandle, RegistryError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.clone()))?;

        room.get(peer_id)
            .ok_or_else(|| RegistryError::PeerNotFound(room_id.clone(), peer_id.clone()))
    }

    /// Remove a member, deleting the room if it is now empty
    ///
    /// The connection binding is left in place; see
    /// [`forget_connection`](Self::forget_connection).
    pub fn remove_member(
        &mut self,
        room_id: &RoomId,
        peer_id: &PeerId,
    ) -> Result<PeerHandle, RegistryError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.clone()))?;

        let handle = room
            .remove(peer_id)
            .ok_or_else(|| RegistryError::PeerNotFound(room_id.clone(), peer_id.clone()))?;

        let remaining = room.len();
        tracing::info!(
            room = %room_id,
            peer = %peer_id,
            members = remaining,
            "Peer left"
        );

        if remaining == 0 {
            self.rooms.remove(room_id);
            tracing::info!(room = %room_id, "Room empty, removed");
        }

        Ok(handle)
    }

    /// Identity a connection joined as, if any
    pub fn identity_of(&self, connection: ConnectionId) -> Option<(RoomId, PeerId)> {
        self.bindings.get(&connection).cloned()
    }

    /// Drop a connection's identity binding
    pub fn forget_connection(&mut self, connection: ConnectionId) -> Option<(RoomId, PeerId)> {
        self.bindings.remove(&connection)
    }

    /// Check if a room exists
    pub fn room_exists(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Number of rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of members in a room (0 if absent)
    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, Room::len)
    }

    /// Number of connections bound to an identity in this room
    pub fn bound_connections(&self, room_id: &RoomId) -> usize {
        self.bindings
            .values()
            .filter(|(room, _)| room == room_id)
            .count()
    }

    /// Registry counters
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            rooms: self.rooms.len(),
            members: self.rooms.values().map(Room::len).sum(),
            bindings: self.bindings.len(),
        }
    }
}
