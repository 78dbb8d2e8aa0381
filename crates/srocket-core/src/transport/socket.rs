//! Socket and server handles exposed by a transport.
//!
//! A transport hands the router one [`Socket`] per connection. The socket
//! covers the sender-relative delivery targets (the sender itself, everyone
//! else in its namespace, a room without the sender) while the [`Server`] it
//! belongs to covers the inclusive ones (a whole room, a whole namespace).
//!
//! Every socket is a member of a room named after its own id, so addressing
//! one peer is a room emission.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportResult;

/// The namespace every connection belongs to unless it asks for another.
pub const ROOT_NAMESPACE: &str = "/";

/// Acknowledgement channel supplied with an inbound event.
///
/// Invoking it sends the given arguments back to the sender as the reply to
/// that event.
pub type AckCallback = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// Shared handle to a connected socket.
pub type SocketRef = Arc<dyn Socket>;

/// Shared handle to the server a socket is connected to.
pub type ServerRef = Arc<dyn Server>;

/// Information about a connection, captured at handshake time.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Remote address (if available).
    pub remote_addr: Option<String>,
    /// Connection protocol (websocket, memory, ...).
    pub protocol: String,
    /// Handshake headers and other metadata.
    pub metadata: HashMap<String, String>,
}

impl ConnectionInfo {
    /// Creates new connection info.
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            remote_addr: None,
            protocol: protocol.into(),
            metadata: HashMap::new(),
        }
    }

    /// Sets the remote address.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Adds metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One live connection.
#[async_trait]
pub trait Socket: Send + Sync + 'static {
    /// Unique id of this connection.
    fn id(&self) -> &str;

    /// Namespace the connection joined.
    fn namespace(&self) -> &str;

    /// Handshake information.
    fn info(&self) -> &ConnectionInfo;

    /// The server this socket is connected to.
    fn server(&self) -> ServerRef;

    /// Emits an event to this socket only.
    async fn emit(&self, event: &str, args: Vec<Value>) -> TransportResult<()>;

    /// Emits an event to every socket in this namespace except this one.
    async fn broadcast(&self, event: &str, args: Vec<Value>) -> TransportResult<()>;

    /// Emits an event to every member of `room` except this socket.
    async fn to_room(&self, room: &str, event: &str, args: Vec<Value>) -> TransportResult<()>;

    /// Adds this socket to a room.
    fn join(&self, room: &str);

    /// Removes this socket from a room.
    fn leave(&self, room: &str);

    /// Rooms this socket is currently in, including its own id.
    fn rooms(&self) -> Vec<String>;

    /// Closes the connection from the server side.
    fn disconnect(&self);
}

/// The server side of a transport.
#[async_trait]
pub trait Server: Send + Sync + 'static {
    /// Emits an event to every member of `room` in `namespace`.
    async fn emit_to_room(
        &self,
        namespace: &str,
        room: &str,
        event: &str,
        args: Vec<Value>,
    ) -> TransportResult<()>;

    /// Emits an event to every socket in `namespace`.
    async fn emit_to_namespace(
        &self,
        namespace: &str,
        event: &str,
        args: Vec<Value>,
    ) -> TransportResult<()>;

    /// Looks up a connected socket.
    fn socket(&self, namespace: &str, id: &str) -> Option<SocketRef>;

    /// Number of connected sockets across all namespaces.
    fn socket_count(&self) -> usize;

    /// Closes every connection.
    fn close(&self);
}
