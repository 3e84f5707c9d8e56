//! Message routing
//!
//! The [`Router`] applies the signaling protocol to one decoded message at a
//! time: join announcements, verbatim forwarding of offers/answers/candidates,
//! and peer removal on leave or disconnect. Every failure becomes a single
//! `error` reply to the connection that caused it.

use std::sync::Arc;

use crate::protocol::{Rejection, RelayMessage, ServerMessage, SignalMessage};
use crate::registry::{ConnectionId, PeerHandle, PeerId, RegistryState, RoomId, RoomRegistry};
use crate::stats::RelayStats;

/// Applies the signaling protocol on top of a [`RoomRegistry`]
#[derive(Clone)]
pub struct Router {
    registry: Arc<RoomRegistry>,
    stats: Arc<RelayStats>,
}

impl Router {
    /// Create a router over a shared registry
    pub fn new(registry: Arc<RoomRegistry>, stats: Arc<RelayStats>) -> Self {
        Self { registry, stats }
    }

    /// Get a reference to the room registry
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Get a reference to the relay counters
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Handle one text payload received on `conn`
    ///
    /// Payloads arriving after `conn` was closed (by a leave or a disconnect)
    /// are dropped.
    pub async fn handle_text(&self, conn: &PeerHandle, text: &str) {
        if !conn.is_open() {
            tracing::debug!(connection = %conn.id(), "Dropping message from closed connection");
            return;
        }
        self.stats.message_received();

        let message = match SignalMessage::decode(text) {
            Ok(message) => message,
            Err(rejection) => {
                self.reject(conn, &rejection);
                return;
            }
        };

        tracing::debug!(
            connection = %conn.id(),
            kind = message.kind(),
            room = %message.room_id(),
            sender = %message.sender_id(),
            "Message received"
        );

        let result = match message {
            SignalMessage::Join { room_id, sender_id } => {
                self.handle_join(conn, &room_id, &sender_id).await
            }
            SignalMessage::Leave { room_id, sender_id } => {
                self.handle_leave(conn, &room_id, &sender_id).await;
                Ok(())
            }
            SignalMessage::Relay(relay) => self.handle_relay(&relay).await,
        };

        if let Err(rejection) = result {
            self.reject(conn, &rejection);
        }
    }

    /// Handle one binary payload received on `conn`
    ///
    /// UTF-8 payloads are handled like text frames; anything else is
    /// answered as malformed.
    pub async fn handle_binary(&self, conn: &PeerHandle, data: &[u8]) {
        match std::str::from_utf8(data) {
            Ok(text) => self.handle_text(conn, text).await,
            Err(e) => {
                if !conn.is_open() {
                    return;
                }
                self.stats.message_received();
                self.reject(conn, &Rejection::InvalidJson(e.to_string()));
            }
        }
    }

    /// Tear down after the transport reported `conn` closed or errored
    ///
    /// Safe to call more than once, and for connections that never joined.
    pub async fn handle_disconnect(&self, conn: &PeerHandle) {
        {
            let mut state = self.registry.write().await;
            match state.identity_of(conn.id()) {
                Some((room_id, peer_id)) => {
                    self.remove_peer(&mut state, conn.id(), &room_id, &peer_id);
                }
                None => {
                    tracing::debug!(
                        connection = %conn.id(),
                        "Connection closed without room binding"
                    );
                }
            }
        }

        conn.close();
    }

    async fn handle_join(
        &self,
        conn: &PeerHandle,
        room_id: &RoomId,
        sender_id: &PeerId,
    ) -> Result<(), Rejection> {
        let mut state = self.registry.write().await;

        if let Some((bound_room, bound_peer)) = state.identity_of(conn.id()) {
            return Err(Rejection::ConnectionBound {
                room_id: bound_room,
                peer_id: bound_peer,
            });
        }

        state.create_room_if_absent(room_id);

        if state.is_member(room_id, sender_id) {
            return Err(Rejection::AlreadyJoined {
                room_id: room_id.clone(),
            });
        }

        // Announce both ways before inserting, so the newcomer never hears
        // about itself
        let newcomer = ServerMessage::joined(room_id, sender_id);
        for (existing_id, existing) in state.members(room_id).unwrap_or_default() {
            if !existing.is_open() {
                tracing::debug!(room = %room_id, peer = %existing_id, "Skipping stale member");
                continue;
            }
            self.notify(&existing, &newcomer);
            self.notify(conn, &ServerMessage::joined(room_id, &existing_id));
        }

        if let Err(e) = state.add_member(room_id, sender_id, conn.clone()) {
            tracing::error!(error = %e, "Join precondition violated under registry lock");
        }

        Ok(())
    }

    async fn handle_leave(&self, conn: &PeerHandle, room_id: &RoomId, sender_id: &PeerId) {
        {
            let mut state = self.registry.write().await;
            self.remove_peer(&mut state, conn.id(), room_id, sender_id);
        }

        conn.close();
    }

    async fn handle_relay(&self, relay: &RelayMessage) -> Result<(), Rejection> {
        let state = self.registry.read().await;

        let delivered = state
            .member(&relay.room_id, &relay.receiver_id)
            .is_ok_and(|target| target.send(relay.raw.as_str()).is_ok());

        if !delivered {
            return Err(Rejection::Unreachable {
                kind: relay.kind,
                sender_id: relay.sender_id.clone(),
                receiver_id: relay.receiver_id.clone(),
            });
        }

        self.stats.message_relayed();
        tracing::debug!(
            kind = %relay.kind,
            room = %relay.room_id,
            sender = %relay.sender_id,
            receiver = %relay.receiver_id,
            "Message relayed"
        );

        Ok(())
    }

    /// Remove `peer_id` from `room_id` and notify whoever is left
    ///
    /// Runs under the registry write guard. Closing the triggering connection
    /// is left to the caller, after the guard is released.
    fn remove_peer(
        &self,
        state: &mut RegistryState,
        connection: ConnectionId,
        room_id: &RoomId,
        peer_id: &PeerId,
    ) {
        let removed = match state.remove_member(room_id, peer_id) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(
                    connection = %connection,
                    error = %e,
                    "Leave for peer that is not a member"
                );
                return;
            }
        };

        let departed = ServerMessage::left(room_id, peer_id);
        // Room is already gone if this was the last member
        for (_, remaining) in state.members(room_id).unwrap_or_default() {
            self.notify(&remaining, &departed);
        }

        // Normally the triggering connection; differs only when a client
        // names someone else's peer id
        state.forget_connection(removed.id());
        if removed.id() != connection {
            tracing::warn!(
                connection = %connection,
                removed = %removed.id(),
                room = %room_id,
                peer = %peer_id,
                "Peer removed by another connection"
            );
        }
    }

    fn reject(&self, conn: &PeerHandle, rejection: &Rejection) {
        tracing::warn!(
            connection = %conn.id(),
            reason = %rejection,
            detail = ?rejection,
            "Message rejected"
        );
        if self.deliver(conn, &rejection.to_reply()) {
            self.stats.error_sent();
        }
    }

    fn notify(&self, target: &PeerHandle, message: &ServerMessage) {
        if self.deliver(target, message) {
            self.stats.notification_sent();
        }
    }

    fn deliver(&self, target: &PeerHandle, message: &ServerMessage) -> bool {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode server message");
                return false;
            }
        };

        match target.send(text) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping message for closed connection");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::registry::Outbound;

    fn router() -> Router {
        Router::new(Arc::new(RoomRegistry::new()), Arc::new(RelayStats::new()))
    }

    fn connect(id: u64) -> (PeerHandle, UnboundedReceiver<Outbound>) {
        PeerHandle::channel(ConnectionId(id))
    }

    /// Everything queued so far, text frames parsed as JSON
    fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Option<Value>> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(match item {
                Outbound::Text(text) => Some(serde_json::from_str(&text).unwrap()),
                Outbound::Close => None,
            });
        }
        out
    }

    fn texts(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Value> {
        drain(rx).into_iter().flatten().collect()
    }

    async fn join(router: &Router, conn: &PeerHandle, room: &str, peer: &str) {
        let msg = json!({"type": "join", "roomId": room, "senderId": peer});
        router.handle_text(conn, &msg.to_string()).await;
    }

    async fn assert_consistent(router: &Router, room: &str) {
        let state = router.registry().read().await;
        let room = RoomId::new(room);
        assert_eq!(state.member_count(&room), state.bound_connections(&room));
        assert_eq!(state.room_exists(&room), state.member_count(&room) > 0);
    }

    #[tokio::test]
    async fn test_join_announces_both_ways() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);

        join(&router, &a, "r1", "a").await;
        assert!(drain(&mut a_rx).is_empty());

        join(&router, &b, "r1", "b").await;
        assert_eq!(
            texts(&mut a_rx),
            vec![json!({"type": "join", "roomId": "r1", "senderId": "b"})]
        );
        assert_eq!(
            texts(&mut b_rx),
            vec![json!({"type": "join", "roomId": "r1", "senderId": "a"})]
        );
        assert_consistent(&router, "r1").await;
    }

    #[tokio::test]
    async fn test_newcomer_gets_full_roster() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);
        let (c, mut c_rx) = connect(3);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        join(&router, &c, "r1", "c").await;

        let mut roster: Vec<String> = texts(&mut c_rx)
            .into_iter()
            .map(|m| m["senderId"].as_str().unwrap().to_string())
            .collect();
        roster.sort();
        assert_eq!(roster, vec!["a", "b"]);

        for rx in [&mut a_rx, &mut b_rx] {
            assert_eq!(
                texts(rx),
                vec![json!({"type": "join", "roomId": "r1", "senderId": "c"})]
            );
        }
    }

    #[tokio::test]
    async fn test_duplicate_join_rejected_once() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);
        let (imposter, mut imposter_rx) = connect(3);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        join(&router, &imposter, "r1", "a").await;

        let replies = texts(&mut imposter_rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["type"], "error");
        assert_eq!(replies[0]["originalType"], "join");
        assert_eq!(replies[0]["senderId"], "server");
        assert!(drain(&mut a_rx).is_empty());
        assert!(drain(&mut b_rx).is_empty());

        let state = router.registry().read().await;
        let slot = state.member(&RoomId::new("r1"), &PeerId::new("a")).unwrap();
        assert_eq!(slot.id(), ConnectionId(1));
        assert_eq!(state.member_count(&RoomId::new("r1")), 2);
        assert_eq!(state.identity_of(ConnectionId(3)), None);
    }

    #[tokio::test]
    async fn test_second_join_on_bound_connection_rejected() {
        let router = router();
        let (a, mut a_rx) = connect(1);

        join(&router, &a, "r1", "a").await;
        join(&router, &a, "r2", "x").await;

        let replies = texts(&mut a_rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["type"], "error");

        let state = router.registry().read().await;
        assert!(!state.room_exists(&RoomId::new("r2")));
        assert_eq!(
            state.identity_of(ConnectionId(1)),
            Some((RoomId::new("r1"), PeerId::new("a")))
        );
    }

    #[tokio::test]
    async fn test_offer_forwarded_verbatim() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);
        let (c, mut c_rx) = connect(3);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        join(&router, &c, "r1", "c").await;
        drain(&mut a_rx);
        drain(&mut b_rx);
        drain(&mut c_rx);

        let offer = r#"{"type":"offer","roomId":"r1","senderId":"a","receiverId":"b","sdp":"X"}"#;
        router.handle_text(&a, offer).await;

        assert_eq!(b_rx.try_recv().unwrap(), Outbound::Text(offer.to_string()));
        assert!(drain(&mut b_rx).is_empty());
        assert!(drain(&mut a_rx).is_empty());
        assert!(drain(&mut c_rx).is_empty());
        assert_eq!(router.stats().snapshot().messages_relayed, 1);
    }

    #[tokio::test]
    async fn test_relay_to_absent_peer() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        let msg = json!({"type": "candidate", "roomId": "r1", "senderId": "a", "receiverId": "zed"});
        router.handle_text(&a, &msg.to_string()).await;

        let replies = texts(&mut a_rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["type"], "error");
        assert_eq!(replies[0]["originalType"], "candidate");
        assert_eq!(replies[0]["receiverId"], "a");
        assert!(replies[0]["message"].as_str().unwrap().contains("zed"));
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn test_relay_to_closed_peer() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, b_rx) = connect(2);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        drain(&mut a_rx);
        drop(b_rx); // writer gone, disconnect not processed yet

        let msg = json!({"type": "answer", "roomId": "r1", "senderId": "a", "receiverId": "b"});
        router.handle_text(&a, &msg.to_string()).await;

        let replies = texts(&mut a_rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["originalType"], "answer");
    }

    #[tokio::test]
    async fn test_relay_requires_receiver() {
        let router = router();
        let (a, mut a_rx) = connect(1);

        join(&router, &a, "r1", "a").await;
        let msg = json!({"type": "offer", "roomId": "r1", "senderId": "a", "sdp": "X"});
        router.handle_text(&a, &msg.to_string()).await;

        let replies = texts(&mut a_rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["message"], "'offer' requires 'receiverId'");
        assert_eq!(replies[0]["originalType"], "offer");
    }

    #[tokio::test]
    async fn test_leave_notifies_and_closes() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        let leave = json!({"type": "leave", "roomId": "r1", "senderId": "a"});
        router.handle_text(&a, &leave.to_string()).await;

        assert_eq!(
            texts(&mut b_rx),
            vec![json!({"type": "leave", "roomId": "r1", "senderId": "a"})]
        );
        assert_eq!(drain(&mut a_rx), vec![None]); // just the close
        assert!(!a.is_open());

        let state = router.registry().read().await;
        let members = state.members(&RoomId::new("r1")).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].0, PeerId::new("b"));
        assert_eq!(state.identity_of(ConnectionId(1)), None);
    }

    #[tokio::test]
    async fn test_last_leave_removes_room() {
        let router = router();
        let (a, _a_rx) = connect(1);

        join(&router, &a, "r1", "a").await;
        let leave = json!({"type": "leave", "roomId": "r1", "senderId": "a"});
        router.handle_text(&a, &leave.to_string()).await;

        let stats = router.registry().stats().await;
        assert_eq!(stats.rooms, 0);
        assert_eq!(stats.bindings, 0);
    }

    #[tokio::test]
    async fn test_disconnect_tears_down_membership() {
        let router = router();
        let (a, _a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        drain(&mut b_rx);

        router.handle_disconnect(&a).await;
        router.handle_disconnect(&a).await;

        assert_eq!(
            texts(&mut b_rx),
            vec![json!({"type": "leave", "roomId": "r1", "senderId": "a"})]
        );
        assert_consistent(&router, "r1").await;
        assert_eq!(router.registry().stats().await.members, 1);
    }

    #[tokio::test]
    async fn test_leave_then_disconnect_is_idempotent() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        drain(&mut b_rx);

        let leave = json!({"type": "leave", "roomId": "r1", "senderId": "a"});
        router.handle_text(&a, &leave.to_string()).await;
        router.handle_disconnect(&a).await;

        assert_eq!(texts(&mut b_rx).len(), 1);
        assert_eq!(drain(&mut a_rx).iter().filter(|m| m.is_none()).count(), 1);
        assert_consistent(&router, "r1").await;
    }

    #[tokio::test]
    async fn test_disconnect_without_join() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);

        join(&router, &b, "r1", "b").await;
        router.handle_disconnect(&a).await;

        assert_eq!(drain(&mut a_rx), vec![None]);
        assert!(drain(&mut b_rx).is_empty());

        let stats = router.registry().stats().await;
        assert_eq!(stats.rooms, 1);
        assert_eq!(stats.members, 1);
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_messages() {
        let router = router();
        let (a, mut a_rx) = connect(1);

        router.handle_text(&a, "{not json").await;
        router.handle_text(&a, r#"{"type":"join","roomId":"r1"}"#).await;
        router
            .handle_text(&a, r#"{"type":"dance","roomId":"r1","senderId":"a"}"#)
            .await;

        let replies = texts(&mut a_rx);
        assert_eq!(replies.len(), 3);
        assert!(replies.iter().all(|r| r["type"] == "error"));
        assert_eq!(replies[0]["message"], "invalid JSON message format");
        assert!(replies[1].get("originalType").is_none());
        assert_eq!(replies[2]["originalType"], "dance");

        assert_eq!(router.registry().stats().await.rooms, 0);
        assert_eq!(router.stats().snapshot().errors_sent, 3);
    }

    #[tokio::test]
    async fn test_leave_naming_other_peer_keeps_index_consistent() {
        let router = router();
        let (a, _a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);
        let (c, mut c_rx) = connect(3);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        join(&router, &c, "r1", "c").await;
        drain(&mut b_rx);
        drain(&mut c_rx);

        let spoof = json!({"type": "leave", "roomId": "r1", "senderId": "b"});
        router.handle_text(&a, &spoof.to_string()).await;
        assert_consistent(&router, "r1").await;
        assert_eq!(
            texts(&mut c_rx),
            vec![json!({"type": "leave", "roomId": "r1", "senderId": "b"})]
        );

        // The sender's own membership goes with its connection
        router.handle_disconnect(&a).await;
        assert_consistent(&router, "r1").await;
        assert_eq!(
            texts(&mut c_rx),
            vec![json!({"type": "leave", "roomId": "r1", "senderId": "a"})]
        );
        assert_eq!(router.registry().stats().await.members, 1);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_joins() {
        let router = router();
        let mut receivers = Vec::new();
        let mut tasks = Vec::new();

        for id in 0..8 {
            let (conn, rx) = connect(id);
            receivers.push(rx);
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                join(&router, &conn, "r1", "same").await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let errors: usize = receivers.iter_mut().map(|rx| texts(rx).len()).sum();
        assert_eq!(errors, 7);
        assert_eq!(router.registry().stats().await.members, 1);
        assert_consistent(&router, "r1").await;
    }

    #[tokio::test]
    async fn test_messages_after_leave_are_dropped() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        let leave = json!({"type": "leave", "roomId": "r1", "senderId": "a"});
        router.handle_text(&a, &leave.to_string()).await;
        join(&router, &a, "r1", "ghost").await;

        assert_eq!(
            texts(&mut b_rx),
            vec![json!({"type": "leave", "roomId": "r1", "senderId": "a"})]
        );
        assert_eq!(drain(&mut a_rx), vec![None]);

        let state = router.registry().read().await;
        assert_eq!(state.member_count(&RoomId::new("r1")), 1);
        assert!(!state.is_member(&RoomId::new("r1"), &PeerId::new("ghost")));
        assert_eq!(state.identity_of(ConnectionId(1)), None);
    }

    #[tokio::test]
    async fn test_leave_for_non_member_only_closes() {
        let router = router();
        let (a, mut a_rx) = connect(1);
        let (b, mut b_rx) = connect(2);

        join(&router, &a, "r1", "a").await;
        join(&router, &b, "r1", "b").await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        let leave = json!({"type": "leave", "roomId": "r1", "senderId": "zed"});
        router.handle_text(&a, &leave.to_string()).await;

        // No error reply, only the close
        assert_eq!(drain(&mut a_rx), vec![None]);
        assert!(drain(&mut b_rx).is_empty());
        {
            let state = router.registry().read().await;
            let room = RoomId::new("r1");
            assert_eq!(state.member(&room, &PeerId::new("a")).unwrap().id(), ConnectionId(1));
            assert_eq!(
                state.identity_of(ConnectionId(1)),
                Some((room, PeerId::new("a")))
            );
        }

        router.handle_disconnect(&a).await;
        assert_eq!(
            texts(&mut b_rx),
            vec![json!({"type": "leave", "roomId": "r1", "senderId": "a"})]
        );
        assert_consistent(&router, "r1").await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_and_leaves() {
        let router = router();
        let mut receivers = Vec::new();
        let mut tasks = Vec::new();

        for id in 0..16u64 {
            let (conn, rx) = connect(id);
            receivers.push(rx);
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                let peer = format!("p{id}");
                join(&router, &conn, "r1", &peer).await;
                if id % 2 == 0 {
                    let leave = json!({"type": "leave", "roomId": "r1", "senderId": peer});
                    router.handle_text(&conn, &leave.to_string()).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_consistent(&router, "r1").await;
        let stats = router.registry().stats().await;
        assert_eq!(stats.members, 8);
        assert_eq!(stats.bindings, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_leave_racing_join_for_same_peer() {
        let router = router();
        let (x, _x_rx) = connect(1);
        let (y, _y_rx) = connect(2);

        join(&router, &x, "r1", "p").await;

        let leaving = {
            let router = router.clone();
            tokio::spawn(async move {
                let leave = json!({"type": "leave", "roomId": "r1", "senderId": "p"});
                router.handle_text(&x, &leave.to_string()).await;
            })
        };
        let joining = {
            let router = router.clone();
            tokio::spawn(async move {
                join(&router, &y, "r1", "p").await;
            })
        };
        leaving.await.unwrap();
        joining.await.unwrap();

        assert_consistent(&router, "r1").await;
        let state = router.registry().read().await;
        assert_eq!(state.identity_of(ConnectionId(1)), None);
        // Either the join lost the race and was rejected, or it took the freed slot
        if let Ok(slot) = state.member(&RoomId::new("r1"), &PeerId::new("p")) {
            assert_eq!(slot.id(), ConnectionId(2));
        }
    }

    #[tokio::test]
    async fn test_binary_payloads() {
        let router = router();
        let (a, mut a_rx) = connect(1);

        let payload = json!({"type": "join", "roomId": "r1", "senderId": "a"}).to_string();
        router.handle_binary(&a, payload.as_bytes()).await;
        assert!(router
            .registry()
            .read()
            .await
            .is_member(&RoomId::new("r1"), &PeerId::new("a")));

        router.handle_binary(&a, &[0xff, 0xfe, 0x00]).await;
        let replies = texts(&mut a_rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["message"], "invalid JSON message format");
    }
}
