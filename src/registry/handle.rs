//! Connection handles held by the registry
//!
//! The transport owns every socket. What the registry stores is a
//! [`PeerHandle`]: a cheap, clonable sender onto the connection's outbound
//! queue plus a shared open flag. Dropping a handle never closes anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

/// Identifier the listener assigns to each accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Item queued for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A whole text payload
    Text(String),
    /// Send a close frame and stop writing
    Close,
}

/// Error returned when a payload cannot be queued for a connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("connection {0} is closed")]
pub struct ConnectionClosed(pub ConnectionId);

/// Non-owning handle onto one transport connection
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl PeerHandle {
    /// Create a handle feeding the given writer queue
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            tx,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a handle together with the receiving end of its queue
    pub fn channel(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the transport can still accept payloads for this connection
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Queue a text payload
    ///
    /// Fails fast if the connection is closing or its writer has gone away.
    pub fn send(&self, text: impl Into<String>) -> Result<(), ConnectionClosed> {
        if !self.is_open() {
            return Err(ConnectionClosed(self.id));
        }
        self.tx
            .send(Outbound::Text(text.into()))
            .map_err(|_| ConnectionClosed(self.id))
    }

    /// Ask the writer to close the connection
    ///
    /// Only the first call queues a close frame.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.tx.send(Outbound::Close);
        }
    }

    /// Resolves once the writer side has dropped its receiver
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}
