//! Connection registry shared by every socket of one listener.
//!
//! Sockets are grouped by namespace. Within a namespace, rooms map a room
//! name to the ids of its members; each socket is a member of the room named
//! after its own id for as long as it is connected.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use srocket_core::{Packet, Server, SocketRef, TransportResult};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::socket::WsSocket;

/// Sockets and rooms of one namespace.
#[derive(Default)]
struct Namespace {
    sockets: HashMap<String, Arc<WsSocket>>,
    rooms: HashMap<String, HashSet<String>>,
}

impl Namespace {
    fn senders<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a String>,
        except: Option<&str>,
    ) -> Vec<mpsc::Sender<String>> {
        ids.into_iter()
            .filter(|id| Some(id.as_str()) != except)
            .filter_map(|id| self.sockets.get(id))
            .map(|socket| socket.sender())
            .collect()
    }
}

/// The [`Server`] side of a WebSocket listener.
pub struct WsServer {
    namespaces: RwLock<HashMap<String, Namespace>>,
    shutdown_token: CancellationToken,
}

impl WsServer {
    pub(crate) fn new(shutdown_token: CancellationToken) -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            shutdown_token,
        }
    }

    /// Token cancelled when the listener shuts down.
    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// Adds a socket to its namespace and to the room named after its id.
    pub(crate) fn register(&self, socket: Arc<WsSocket>) {
        let id = socket.id_str().to_string();
        let mut namespaces = self.namespaces.write();
        let namespace = namespaces
            .entry(socket.namespace_str().to_string())
            .or_default();
        namespace
            .rooms
            .entry(id.clone())
            .or_default()
            .insert(id.clone());
        namespace.sockets.insert(id, socket);
    }

    /// Removes a socket from its namespace and from every room.
    pub(crate) fn unregister(&self, namespace: &str, id: &str) {
        let mut namespaces = self.namespaces.write();
        let Some(ns) = namespaces.get_mut(namespace) else {
            return;
        };
        ns.sockets.remove(id);
        ns.rooms.retain(|_, members| {
            members.remove(id);
            !members.is_empty()
        });
        if ns.sockets.is_empty() {
            namespaces.remove(namespace);
        }
    }

    pub(crate) fn join(&self, namespace: &str, room: &str, id: &str) {
        let mut namespaces = self.namespaces.write();
        if let Some(ns) = namespaces.get_mut(namespace)
            && ns.sockets.contains_key(id)
        {
            ns.rooms
                .entry(room.to_string())
                .or_default()
                .insert(id.to_string());
        }
    }

    pub(crate) fn leave(&self, namespace: &str, room: &str, id: &str) {
        let mut namespaces = self.namespaces.write();
        if let Some(ns) = namespaces.get_mut(namespace)
            && let Some(members) = ns.rooms.get_mut(room)
        {
            members.remove(id);
            if members.is_empty() {
                ns.rooms.remove(room);
            }
        }
    }

    /// Rooms `id` is a member of, sorted by name.
    pub(crate) fn rooms_of(&self, namespace: &str, id: &str) -> Vec<String> {
        let namespaces = self.namespaces.read();
        let Some(ns) = namespaces.get(namespace) else {
            return Vec::new();
        };
        ns.rooms
            .iter()
            .filter(|(_, members)| members.contains(id))
            .map(|(room, _)| room.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Senders of every socket in `namespace` except `except`.
    pub(crate) fn namespace_senders(
        &self,
        namespace: &str,
        except: Option<&str>,
    ) -> Vec<mpsc::Sender<String>> {
        let namespaces = self.namespaces.read();
        namespaces
            .get(namespace)
            .map(|ns| ns.senders(ns.sockets.keys(), except))
            .unwrap_or_default()
    }

    /// Senders of every member of `room` in `namespace` except `except`.
    pub(crate) fn room_senders(
        &self,
        namespace: &str,
        room: &str,
        except: Option<&str>,
    ) -> Vec<mpsc::Sender<String>> {
        let namespaces = self.namespaces.read();
        namespaces
            .get(namespace)
            .and_then(|ns| ns.rooms.get(room).map(|members| ns.senders(members, except)))
            .unwrap_or_default()
    }
}

/// Encodes one event packet and queues it on every sender.
///
/// Never waits on a peer: a full queue drops the frame for that peer only,
/// and peers whose connection is already gone are skipped.
pub(crate) async fn fan_out(
    senders: Vec<mpsc::Sender<String>>,
    event: &str,
    args: Vec<Value>,
) -> TransportResult<()> {
    if senders.is_empty() {
        debug!(event = %event, "No recipients for emission");
        return Ok(());
    }

    let frame = Packet::event(event, args).encode()?;
    for sender in senders {
        match sender.try_send(frame.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(event = %event, "Outgoing queue full, dropping frame for slow peer");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(event = %event, "Skipping closed connection");
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Server for WsServer {
    async fn emit_to_room(
        &self,
        namespace: &str,
        room: &str,
        event: &str,
        args: Vec<Value>,
    ) -> TransportResult<()> {
        fan_out(self.room_senders(namespace, room, None), event, args).await
    }

    async fn emit_to_namespace(
        &self,
        namespace: &str,
        event: &str,
        args: Vec<Value>,
    ) -> TransportResult<()> {
        fan_out(self.namespace_senders(namespace, None), event, args).await
    }

    fn socket(&self, namespace: &str, id: &str) -> Option<SocketRef> {
        self.namespaces
            .read()
            .get(namespace)
            .and_then(|ns| ns.sockets.get(id))
            .map(|socket| Arc::clone(socket) as SocketRef)
    }

    fn socket_count(&self) -> usize {
        self.namespaces
            .read()
            .values()
            .map(|ns| ns.sockets.len())
            .sum()
    }

    fn close(&self) {
        if !self.shutdown_token.is_cancelled() {
            info!(connections = self.socket_count(), "Closing all connections");
            self.shutdown_token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srocket_core::ConnectionInfo;

    fn connect(
        server: &Arc<WsServer>,
        id: &str,
        namespace: &str,
    ) -> (Arc<WsSocket>, mpsc::Receiver<String>) {
        connect_with_capacity(server, id, namespace, 8)
    }

    fn connect_with_capacity(
        server: &Arc<WsServer>,
        id: &str,
        namespace: &str,
        capacity: usize,
    ) -> (Arc<WsSocket>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let socket = Arc::new(WsSocket::new(
            id.to_string(),
            namespace.to_string(),
            ConnectionInfo::new("websocket"),
            Arc::clone(server),
            tx,
        ));
        server.register(Arc::clone(&socket));
        (socket, rx)
    }

    fn server() -> Arc<WsServer> {
        Arc::new(WsServer::new(CancellationToken::new()))
    }

    #[test]
    fn test_socket_joins_own_room() {
        let server = server();
        let (_socket, _rx) = connect(&server, "a", "/");

        assert_eq!(server.rooms_of("/", "a"), vec!["a".to_string()]);
        assert_eq!(server.socket_count(), 1);
        assert!(server.socket("/", "a").is_some());
        assert!(server.socket("/other", "a").is_none());
    }

    #[test]
    fn test_unregister_clears_rooms_and_namespace() {
        let server = server();
        let (_a, _rx_a) = connect(&server, "a", "/chat");
        let (_b, _rx_b) = connect(&server, "b", "/chat");
        server.join("/chat", "lobby", "a");
        server.join("/chat", "lobby", "b");

        server.unregister("/chat", "a");
        assert_eq!(server.room_senders("/chat", "lobby", None).len(), 1);
        assert!(server.rooms_of("/chat", "a").is_empty());

        server.unregister("/chat", "b");
        assert_eq!(server.socket_count(), 0);
        assert!(server.room_senders("/chat", "lobby", None).is_empty());
    }

    #[test]
    fn test_join_unknown_socket_is_ignored() {
        let server = server();
        let (_a, _rx) = connect(&server, "a", "/");
        server.join("/", "lobby", "ghost");

        assert!(server.room_senders("/", "lobby", None).is_empty());
    }

    #[tokio::test]
    async fn test_emit_to_room_reaches_members_only() {
        let server = server();
        let (_a, mut rx_a) = connect(&server, "a", "/");
        let (_b, mut rx_b) = connect(&server, "b", "/");
        let (_c, mut rx_c) = connect(&server, "c", "/other");
        server.join("/", "lobby", "a");
        server.join("/other", "lobby", "c");

        server
            .emit_to_room("/", "lobby", "news", vec![Value::from(1)])
            .await
            .unwrap();

        let frame = rx_a.recv().await.unwrap();
        assert_eq!(
            Packet::decode(frame.as_bytes()).unwrap(),
            Packet::event("news", vec![Value::from(1)])
        );
        assert!(rx_b.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_emit_to_namespace_includes_everyone_in_it() {
        let server = server();
        let (_a, mut rx_a) = connect(&server, "a", "/");
        let (_b, mut rx_b) = connect(&server, "b", "/");

        server
            .emit_to_namespace("/", "hello", Vec::new())
            .await
            .unwrap();

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_queue_does_not_stall_emission() {
        let server = server();
        let (_slow, mut rx_slow) = connect_with_capacity(&server, "slow", "/", 1);
        let (_fast, mut rx_fast) = connect(&server, "fast", "/");

        server.emit_to_namespace("/", "first", Vec::new()).await.unwrap();
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            server.emit_to_namespace("/", "second", Vec::new()),
        )
        .await
        .expect("emission waited on a full queue")
        .unwrap();

        let frame = |event: &str| Packet::event(event, Vec::new()).encode().unwrap();
        assert_eq!(rx_fast.recv().await.unwrap(), frame("first"));
        assert_eq!(rx_fast.recv().await.unwrap(), frame("second"));
        assert_eq!(rx_slow.recv().await.unwrap(), frame("first"));
        assert!(rx_slow.try_recv().is_err());
    }

    #[test]
    fn test_close_cancels_token() {
        let server = server();
        server.close();
        assert!(server.shutdown_token().is_cancelled());
    }
}
