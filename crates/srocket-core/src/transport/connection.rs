//! Connection handling and lifecycle types.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::socket::{AckCallback, ServerRef, SocketRef};
use crate::error::TransportResult;

// =============================================================================
// Inbound events
// =============================================================================

/// One named event received on a connection.
///
/// The trailing acknowledgement callback of the wire protocol is split off
/// from the arguments by the transport.
#[derive(Clone)]
pub struct InboundEvent {
    /// Event name.
    pub name: String,
    /// Ordered argument payload.
    pub args: Vec<Value>,
    /// Acknowledgement channel, if the sender asked for one.
    pub ack: Option<AckCallback>,
}

impl InboundEvent {
    /// Creates an event without an acknowledgement channel.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            ack: None,
        }
    }

    /// Attaches an acknowledgement channel.
    pub fn with_ack(mut self, ack: AckCallback) -> Self {
        self.ack = Some(ack);
        self
    }
}

impl fmt::Debug for InboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundEvent")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("has_ack", &self.ack.is_some())
            .finish()
    }
}

// =============================================================================
// Connection Handler
// =============================================================================

/// Receives connection lifecycle signals and events from a transport.
///
/// The transport subscribes to every event name on every connection and
/// forwards each one here, so the handler sees events regardless of name.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Called once a connection is established.
    async fn on_connect(&self, socket: SocketRef);

    /// Called for every event received on a connection.
    async fn on_event(&self, socket: SocketRef, event: InboundEvent);

    /// Called when a connection is closed, by either side.
    async fn on_disconnect(&self, socket: SocketRef);
}

/// Boxed connection handler.
pub type BoxedConnectionHandler = Arc<dyn ConnectionHandler>;

// =============================================================================
// Server Transport
// =============================================================================

/// A transport that accepts connections.
#[async_trait]
pub trait ServerTransport: Send + Sync {
    /// Binds `addr` and starts accepting connections.
    ///
    /// Every connection is reported to `handler`. The returned handle stops
    /// the listener and closes all connections when stopped or dropped.
    async fn listen(
        &self,
        addr: &str,
        handler: BoxedConnectionHandler,
    ) -> TransportResult<ListenerHandle>;
}

// =============================================================================
// Handles
// =============================================================================

/// Handle to a listener (server).
///
/// Dropping this handle stops the listener.
pub struct ListenerHandle {
    /// The address the listener is bound to.
    pub local_addr: SocketAddr,
    /// The server accepting connections on this listener.
    server: ServerRef,
    /// Cancelled to shut the listener down.
    shutdown_token: CancellationToken,
}

impl ListenerHandle {
    /// Creates a new listener handle.
    pub fn new(local_addr: SocketAddr, server: ServerRef, shutdown_token: CancellationToken) -> Self {
        Self {
            local_addr,
            server,
            shutdown_token,
        }
    }

    /// The server accepting connections on this listener.
    pub fn server(&self) -> ServerRef {
        Arc::clone(&self.server)
    }

    /// Returns `true` once the listener has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Closes every connection and stops accepting new ones.
    pub fn stop(&self) {
        self.server.close();
        self.shutdown_token.cancel();
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("local_addr", &self.local_addr)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}
