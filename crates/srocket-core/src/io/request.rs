//! Read-only view of one inbound event.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::transport::SocketRef;

struct RequestInner {
    socket: SocketRef,
    event: String,
    data: Vec<Value>,
}

/// The request side of one dispatch cycle.
///
/// Built once per inbound event by the router and handed unchanged through
/// every middleware and into the handler. Clones share the same event; there
/// are no mutators.
#[derive(Clone)]
pub struct SRequest {
    inner: Arc<RequestInner>,
}

impl SRequest {
    /// Creates a request for `event` received on `socket`.
    pub fn new(socket: SocketRef, event: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(RequestInner {
                socket,
                event: event.into(),
                data,
            }),
        }
    }

    /// The connection the event arrived on.
    pub fn socket(&self) -> &SocketRef {
        &self.inner.socket
    }

    /// The event name as sent by the client.
    pub fn event_name(&self) -> &str {
        &self.inner.event
    }

    /// The ordered argument payload, without the acknowledgement callback.
    pub fn data(&self) -> &[Value] {
        &self.inner.data
    }

    /// Returns the argument at `index`.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.inner.data.get(index)
    }

    /// Deserializes the argument at `index`.
    ///
    /// A missing argument deserializes from `null`, so `Option<T>` targets
    /// accept it.
    pub fn parse_arg<T: DeserializeOwned>(&self, index: usize) -> serde_json::Result<T> {
        match self.inner.data.get(index) {
            Some(value) => T::deserialize(value),
            None => T::deserialize(&Value::Null),
        }
    }
}

impl fmt::Debug for SRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SRequest")
            .field("socket_id", &self.inner.socket.id())
            .field("event", &self.inner.event)
            .field("data", &self.inner.data)
            .finish()
    }
}
