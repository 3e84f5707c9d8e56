//! Per-connection worker
//!
//! Each accepted socket gets one worker: a reader loop that feeds frames to
//! the [`Router`] one at a time, and a writer task that drains the
//! connection's [`PeerHandle`] queue onto the socket. The reader stops as
//! soon as the handle is closed.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::Result;
use crate::registry::{ConnectionId, Outbound, PeerHandle};
use crate::router::Router;
use crate::server::config::ServerConfig;

type WsSink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>;

/// One client connection
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    config: ServerConfig,
    router: Router,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        config: ServerConfig,
        router: Router,
    ) -> Self {
        Self {
            id,
            peer_addr,
            config,
            router,
        }
    }

    /// Upgrade the socket and serve it until either side closes
    ///
    /// Teardown always runs once the reader stops, whatever the reason.
    pub async fn run(self, socket: TcpStream) -> Result<()> {
        let ws_config = WebSocketConfig::default()
            .max_message_size(Some(self.config.max_message_size))
            .max_frame_size(Some(self.config.max_frame_size));
        let ws = tokio_tungstenite::accept_async_with_config(socket, Some(ws_config)).await?;

        tracing::debug!(peer = %self.peer_addr, "WebSocket handshake complete");

        let (sink, mut stream) = ws.split();
        let (handle, rx) = PeerHandle::channel(self.id);
        let mut writer = tokio::spawn(write_loop(self.id, sink, rx));

        let result = loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.router.handle_text(&handle, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        self.router.handle_binary(&handle, &data).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break Ok(()),
                    // Ping/pong replies are handled by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(e.into()),
                },
                // Writer finished, e.g. after a leave closed this connection
                _ = handle.closed() => break Ok(()),
            }

            // A leave closed this connection; later frames are not processed
            if !handle.is_open() {
                break Ok(());
            }
        };

        self.router.handle_disconnect(&handle).await;
        drop(handle);

        if tokio::time::timeout(self.config.close_timeout, &mut writer)
            .await
            .is_err()
        {
            tracing::debug!(connection = %self.id, "Writer did not finish in time, aborting");
            writer.abort();
        }

        result
    }
}

async fn write_loop(id: ConnectionId, mut sink: WsSink, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::text(text)).await {
                    tracing::debug!(connection = %id, error = %e, "Send failed");
                    return;
                }
            }
            Outbound::Close => break,
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(connection = %id, error = %e, "Close failed");
    }
}
