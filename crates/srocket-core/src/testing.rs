//! In-memory transport doubles for tests.
//!
//! [`MockServer`] hands out [`MockSocket`]s and records every emission made
//! through either of them, so tests can assert on what would have gone over
//! the wire without binding a port.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{TransportError, TransportResult};
use crate::transport::{AckCallback, ConnectionInfo, Server, ServerRef, Socket, SocketRef};

/// Where a recorded emission was addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single socket.
    Socket(String),
    /// Everyone in `namespace` except `except`.
    Broadcast { namespace: String, except: String },
    /// Members of `room`, optionally excluding one socket.
    Room {
        namespace: String,
        room: String,
        except: Option<String>,
    },
    /// Everyone in a namespace.
    Namespace(String),
}

/// One recorded emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub target: Target,
    pub event: String,
    pub args: Vec<Value>,
}

/// Recording server.
#[derive(Default)]
pub struct MockServer {
    sockets: Mutex<HashMap<(String, String), Weak<MockSocket>>>,
    emissions: Mutex<Vec<Emission>>,
    closed: AtomicBool,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a socket with `id` in `namespace`.
    pub fn connect(self: &Arc<Self>, id: &str, namespace: &str) -> Arc<MockSocket> {
        let socket = Arc::new(MockSocket {
            id: id.to_string(),
            namespace: namespace.to_string(),
            info: ConnectionInfo::new("memory"),
            server: Arc::clone(self),
            rooms: Mutex::new(BTreeSet::from([id.to_string()])),
            disconnected: AtomicBool::new(false),
        });
        self.sockets.lock().insert(
            (namespace.to_string(), id.to_string()),
            Arc::downgrade(&socket),
        );
        socket
    }

    /// Every emission recorded so far, in order.
    pub fn emissions(&self) -> Vec<Emission> {
        self.emissions.lock().clone()
    }

    /// Drains the recorded emissions.
    pub fn take_emissions(&self) -> Vec<Emission> {
        std::mem::take(&mut *self.emissions.lock())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn record(&self, target: Target, event: &str, args: Vec<Value>) {
        self.emissions.lock().push(Emission {
            target,
            event: event.to_string(),
            args,
        });
    }
}

#[async_trait]
impl Server for MockServer {
    async fn emit_to_room(
        &self,
        namespace: &str,
        room: &str,
        event: &str,
        args: Vec<Value>,
    ) -> TransportResult<()> {
        self.record(
            Target::Room {
                namespace: namespace.to_string(),
                room: room.to_string(),
                except: None,
            },
            event,
            args,
        );
        Ok(())
    }

    async fn emit_to_namespace(
        &self,
        namespace: &str,
        event: &str,
        args: Vec<Value>,
    ) -> TransportResult<()> {
        self.record(Target::Namespace(namespace.to_string()), event, args);
        Ok(())
    }

    fn socket(&self, namespace: &str, id: &str) -> Option<SocketRef> {
        let socket = self
            .sockets
            .lock()
            .get(&(namespace.to_string(), id.to_string()))?
            .upgrade()?;
        Some(socket as SocketRef)
    }

    fn socket_count(&self) -> usize {
        self.sockets
            .lock()
            .values()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for socket in self.sockets.lock().values().filter_map(Weak::upgrade) {
            socket.disconnect();
        }
    }
}

/// Recording socket.
pub struct MockSocket {
    id: String,
    namespace: String,
    info: ConnectionInfo,
    server: Arc<MockServer>,
    rooms: Mutex<BTreeSet<String>>,
    disconnected: AtomicBool,
}

impl MockSocket {
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    fn ensure_connected(&self) -> TransportResult<()> {
        if self.is_disconnected() {
            return Err(TransportError::ConnectionClosed {
                reason: "socket disconnected".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Socket for MockSocket {
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
        self.ensure_connected()?;
        self.server
            .record(Target::Socket(self.id.clone()), event, args);
        Ok(())
    }

    async fn broadcast(&self, event: &str, args: Vec<Value>) -> TransportResult<()> {
        self.ensure_connected()?;
        self.server.record(
            Target::Broadcast {
                namespace: self.namespace.clone(),
                except: self.id.clone(),
            },
            event,
            args,
        );
        Ok(())
    }

    async fn to_room(&self, room: &str, event: &str, args: Vec<Value>) -> TransportResult<()> {
        self.ensure_connected()?;
        self.server.record(
            Target::Room {
                namespace: self.namespace.clone(),
                room: room.to_string(),
                except: Some(self.id.clone()),
            },
            event,
            args,
        );
        Ok(())
    }

    fn join(&self, room: &str) {
        self.rooms.lock().insert(room.to_string());
    }

    fn leave(&self, room: &str) {
        self.rooms.lock().remove(room);
    }

    fn rooms(&self) -> Vec<String> {
        self.rooms.lock().iter().cloned().collect()
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::Release);
    }
}

/// Builds an acknowledgement callback that records every call.
pub fn ack_recorder() -> (AckCallback, Arc<Mutex<Vec<Vec<Value>>>>) {
    let replies = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&replies);
    let ack: AckCallback = Arc::new(move |args| sink.lock().push(args));
    (ack, replies)
}
