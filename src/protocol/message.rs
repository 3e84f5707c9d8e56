//! Signaling wire messages
//!
//! Client messages are decoded once, here, into [`SignalMessage`]. Anything
//! that does not fit one of its variants is turned into a [`Rejection`]
//! before the router sees it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::reject::Rejection;
use crate::registry::{PeerId, RoomId};

/// `senderId` carried by every message the relay itself originates
pub const SERVER_SENDER_ID: &str = "server";

/// Handshake message types relayed verbatim to one addressed peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayKind {
    /// SDP offer
    Offer,
    /// SDP answer
    Answer,
    /// ICE candidate
    Candidate,
}

impl RelayKind {
    /// Parse a wire `type` tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "offer" => Some(RelayKind::Offer),
            "answer" => Some(RelayKind::Answer),
            "candidate" => Some(RelayKind::Candidate),
            _ => None,
        }
    }

    /// Wire `type` tag
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayKind::Offer => "offer",
            RelayKind::Answer => "answer",
            RelayKind::Candidate => "candidate",
        }
    }
}

impl std::fmt::Display for RelayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An offer, answer or candidate addressed to one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub kind: RelayKind,
    pub room_id: RoomId,
    pub sender_id: PeerId,
    pub receiver_id: PeerId,
    /// The payload exactly as the sender sent it
    pub raw: String,
}

/// A decoded client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalMessage {
    /// Enter a room
    Join { room_id: RoomId, sender_id: PeerId },
    /// Leave a room
    Leave { room_id: RoomId, sender_id: PeerId },
    /// Forward to `receiver_id`
    Relay(RelayMessage),
}

impl SignalMessage {
    /// Decode a text payload
    ///
    /// `type`, `senderId` and `roomId` must be non-empty strings; relay types
    /// additionally need a non-empty `receiverId`.
    pub fn decode(text: &str) -> Result<Self, Rejection> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Rejection::InvalidJson(e.to_string()))?;
        let fields = value
            .as_object()
            .ok_or_else(|| Rejection::InvalidJson("expected a JSON object".into()))?;

        let (Some(tag), Some(sender), Some(room)) = (
            field(fields, "type"),
            field(fields, "senderId"),
            field(fields, "roomId"),
        ) else {
            return Err(Rejection::Incomplete);
        };

        let room_id = RoomId::new(room);
        let sender_id = PeerId::new(sender);

        match tag {
            "join" => Ok(SignalMessage::Join { room_id, sender_id }),
            "leave" => Ok(SignalMessage::Leave { room_id, sender_id }),
            other => {
                let kind = RelayKind::from_tag(other).ok_or_else(|| Rejection::UnknownType {
                    kind: other.to_string(),
                })?;
                let receiver = field(fields, "receiverId")
                    .ok_or(Rejection::MissingReceiver { kind })?;

                Ok(SignalMessage::Relay(RelayMessage {
                    kind,
                    room_id,
                    sender_id,
                    receiver_id: PeerId::new(receiver),
                    raw: text.to_string(),
                }))
            }
        }
    }

    /// Wire `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::Join { .. } => "join",
            SignalMessage::Leave { .. } => "leave",
            SignalMessage::Relay(relay) => relay.kind.as_str(),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        match self {
            SignalMessage::Join { room_id, .. } | SignalMessage::Leave { room_id, .. } => room_id,
            SignalMessage::Relay(relay) => &relay.room_id,
        }
    }

    pub fn sender_id(&self) -> &PeerId {
        match self {
            SignalMessage::Join { sender_id, .. } | SignalMessage::Leave { sender_id, .. } => {
                sender_id
            }
            SignalMessage::Relay(relay) => &relay.sender_id,
        }
    }
}

fn field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// A message the relay sends to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// `sender_id` is present in the room
    Join {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "senderId")]
        sender_id: PeerId,
    },
    /// `sender_id` left the room
    Leave {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "senderId")]
        sender_id: PeerId,
    },
    /// Failure report for the receiving client
    Error {
        message: String,
        #[serde(
            rename = "originalType",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        original_type: Option<String>,
        #[serde(rename = "senderId")]
        sender_id: String,
        #[serde(rename = "receiverId", default, skip_serializing_if = "Option::is_none")]
        receiver_id: Option<String>,
    },
}

impl ServerMessage {
    pub fn joined(room_id: &RoomId, peer_id: &PeerId) -> Self {
        ServerMessage::Join {
            room_id: room_id.clone(),
            sender_id: peer_id.clone(),
        }
    }

    pub fn left(room_id: &RoomId, peer_id: &PeerId) -> Self {
        ServerMessage::Leave {
            room_id: room_id.clone(),
            sender_id: peer_id.clone(),
        }
    }

    /// Encode as a JSON text payload
    pub fn encode(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
