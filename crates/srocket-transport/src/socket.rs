//! The [`Socket`] handed to the router for each WebSocket connection.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use srocket_core::{
    ConnectionInfo, Packet, ServerRef, Socket, TransportError, TransportResult,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::registry::{WsServer, fan_out};

/// One live WebSocket connection.
///
/// Outgoing frames are queued on a bounded channel drained by the
/// connection's send task.
pub struct WsSocket {
    id: String,
    namespace: String,
    info: ConnectionInfo,
    server: Arc<WsServer>,
    tx: mpsc::Sender<String>,
    shutdown_token: CancellationToken,
}

impl WsSocket {
    pub(crate) fn new(
        id: String,
        namespace: String,
        info: ConnectionInfo,
        server: Arc<WsServer>,
        tx: mpsc::Sender<String>,
    ) -> Self {
        let shutdown_token = server.shutdown_token().child_token();
        Self {
            id,
            namespace,
            info,
            server,
            tx,
            shutdown_token,
        }
    }

    pub(crate) fn id_str(&self) -> &str {
        &self.id
    }

    pub(crate) fn namespace_str(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<String> {
        self.tx.clone()
    }

    /// Cancelled when this connection, or the whole listener, closes.
    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// Queues an already encoded frame for this connection.
    pub(crate) async fn send_frame(&self, frame: String) -> TransportResult<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| TransportError::ConnectionClosed {
                reason: format!("socket '{}' is closed", self.id),
            })
    }
}

#[async_trait]
impl Socket for WsSocket {
    fn id(&self) -> &str {
        &self.id
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    fn server(&self) -> ServerRef {
        Arc::clone(&self.server) as ServerRef
    }

    async fn emit(&self, event: &str, args: Vec<Value>) -> TransportResult<()> {
        let frame = Packet::event(event, args).encode()?;
        self.send_frame(frame).await
    }

    async fn broadcast(&self, event: &str, args: Vec<Value>) -> TransportResult<()> {
        let senders = self
            .server
            .namespace_senders(&self.namespace, Some(&self.id));
        fan_out(senders, event, args).await
    }

    async fn to_room(&self, room: &str, event: &str, args: Vec<Value>) -> TransportResult<()> {
        let senders = self
            .server
            .room_senders(&self.namespace, room, Some(&self.id));
        fan_out(senders, event, args).await
    }

    fn join(&self, room: &str) {
        debug!(socket_id = %self.id, room = %room, "Joining room");
        self.server.join(&self.namespace, room, &self.id);
    }

    fn leave(&self, room: &str) {
        debug!(socket_id = %self.id, room = %room, "Leaving room");
        self.server.leave(&self.namespace, room, &self.id);
    }

    fn rooms(&self) -> Vec<String> {
        self.server.rooms_of(&self.namespace, &self.id)
    }

    fn disconnect(&self) {
        self.shutdown_token.cancel();
    }
}

impl fmt::Debug for WsSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsSocket")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("remote_addr", &self.info.remote_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connect(
        server: &Arc<WsServer>,
        id: &str,
    ) -> (Arc<WsSocket>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        let socket = Arc::new(WsSocket::new(
            id.to_string(),
            "/".to_string(),
            ConnectionInfo::new("websocket"),
            Arc::clone(server),
            tx,
        ));
        server.register(Arc::clone(&socket));
        (socket, rx)
    }

    fn decode(frame: &str) -> Packet {
        Packet::decode(frame.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let server = Arc::new(WsServer::new(CancellationToken::new()));
        let (a, mut rx_a) = connect(&server, "a");
        let (_b, mut rx_b) = connect(&server, "b");

        a.broadcast("hi", vec![json!("x")]).await.unwrap();

        assert_eq!(
            decode(&rx_b.recv().await.unwrap()),
            Packet::event("hi", vec![json!("x")])
        );
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_to_room_by_socket_id_reaches_one_peer() {
        let server = Arc::new(WsServer::new(CancellationToken::new()));
        let (a, _rx_a) = connect(&server, "a");
        let (_b, mut rx_b) = connect(&server, "b");
        let (_c, mut rx_c) = connect(&server, "c");

        a.to_room("b", "dm", Vec::new()).await.unwrap();

        assert!(rx_b.recv().await.is_some());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_emit_after_receiver_dropped_fails() {
        let server = Arc::new(WsServer::new(CancellationToken::new()));
        let (a, rx_a) = connect(&server, "a");
        drop(rx_a);

        let err = a.emit("late", Vec::new()).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed { .. }));
    }

    #[test]
    fn test_join_leave_and_disconnect() {
        let server = Arc::new(WsServer::new(CancellationToken::new()));
        let (a, _rx) = connect(&server, "a");

        a.join("lobby");
        assert_eq!(a.rooms(), vec!["a".to_string(), "lobby".to_string()]);
        a.leave("lobby");
        assert_eq!(a.rooms(), vec!["a".to_string()]);

        a.disconnect();
        assert!(a.shutdown_token().is_cancelled());
        assert!(!server.shutdown_token().is_cancelled());
    }
}
