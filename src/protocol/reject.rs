//! Per-message rejections
//!
//! Every recoverable failure while handling one client message ends up as a
//! [`Rejection`], which turns into exactly one `error` reply to the client
//! that sent it.

use thiserror::Error;

use super::message::{RelayKind, ServerMessage, SERVER_SENDER_ID};
use crate::registry::{PeerId, RoomId};

/// Why a client message was not applied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Payload is not a JSON object
    #[error("invalid JSON message format")]
    InvalidJson(String),

    /// `type`, `senderId` or `roomId` missing
    #[error("incomplete signaling message (type, senderId or roomId missing)")]
    Incomplete,

    /// Peer id already taken in the room
    #[error("you already joined room '{room_id}'")]
    AlreadyJoined { room_id: RoomId },

    /// The connection already joined under some identity
    #[error("connection already joined room '{room_id}' as '{peer_id}'")]
    ConnectionBound { room_id: RoomId, peer_id: PeerId },

    /// Relay type without `receiverId`
    #[error("'{kind}' requires 'receiverId'")]
    MissingReceiver { kind: RelayKind },

    /// Addressed peer absent or not accepting payloads
    #[error("target peer '{receiver_id}' not found or not reachable")]
    Unreachable {
        kind: RelayKind,
        sender_id: PeerId,
        receiver_id: PeerId,
    },

    /// Type tag not part of the protocol
    #[error("unknown message type '{kind}'")]
    UnknownType { kind: String },
}

impl Rejection {
    /// The request type this rejection answers, if known
    pub fn original_type(&self) -> Option<String> {
        match self {
            Rejection::InvalidJson(_) | Rejection::Incomplete => None,
            Rejection::AlreadyJoined { .. } | Rejection::ConnectionBound { .. } => {
                Some("join".to_string())
            }
            Rejection::MissingReceiver { kind } | Rejection::Unreachable { kind, .. } => {
                Some(kind.to_string())
            }
            Rejection::UnknownType { kind } => Some(kind.clone()),
        }
    }

    /// Build the `error` reply sent back to the offending client
    pub fn to_reply(&self) -> ServerMessage {
        let receiver_id = match self {
            Rejection::Unreachable { sender_id, .. } => Some(sender_id.to_string()),
            _ => None,
        };

        ServerMessage::Error {
            message: self.to_string(),
            original_type: self.original_type(),
            sender_id: SERVER_SENDER_ID.to_string(),
            receiver_id,
        }
    }
}
