//! Room identifiers and per-room membership

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::handle::PeerHandle;

/// Opaque room identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque peer identifier, unique within its room
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Members of a single room
///
/// Members iterate in join order, which is also the order join
/// announcements go out in.
#[derive(Debug, Default)]
pub struct Room {
    members: IndexMap<PeerId, PeerHandle>,
}

impl Room {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.members.contains_key(peer_id)
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&PeerHandle> {
        self.members.get(peer_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &PeerHandle)> {
        self.members.iter()
    }

    pub(super) fn insert(&mut self, peer_id: PeerId, handle: PeerHandle) {
        self.members.insert(peer_id, handle);
    }

    /// Remove a member, keeping the relative order of the rest
    pub(super) fn remove(&mut self, peer_id: &PeerId) -> Option<PeerHandle> {
        self.members.shift_remove(peer_id)
    }
}
