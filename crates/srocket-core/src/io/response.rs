//! Outbound reply builder.
//!
//! An [`SResponse`] is created per dispatch cycle next to its [`SRequest`].
//! Handlers chain the setters and finish with one of the terminal sends:
//!
//! ```ignore
//! response
//!     .status(StatusCode::CREATED)
//!     .with_data(json!({ "ok": true }))
//!     .to_sender()
//!     .await?;
//! ```
//!
//! Every emission carries the same [`Envelope`]. The acknowledgement path is
//! the exception: [`SResponse::invoke_ack`] hands the bare data payload to the
//! callback supplied by the client.
//!
//! [`SRequest`]: crate::SRequest

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{trace, warn};

use super::status::StatusCode;
use crate::error::{HandlerError, TransportResult};
use crate::transport::{AckCallback, ROOT_NAMESPACE, SocketRef};

// =============================================================================
// Envelope
// =============================================================================

/// The fixed wire shape of every emitted response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message: String,
    pub status: StatusCode,
    pub payload: Value,
}

impl Envelope {
    /// Converts the envelope into a JSON object.
    pub fn into_value(self) -> Value {
        json!({
            "message": self.message,
            "status": self.status.as_u16(),
            "payload": self.payload,
        })
    }
}

// =============================================================================
// SResponse
// =============================================================================

#[derive(Debug)]
struct ResponseState {
    event_name: Option<String>,
    status: StatusCode,
    message: String,
    data: Value,
}

struct ResponseInner {
    socket: SocketRef,
    route_path: String,
    ack: Option<AckCallback>,
    state: Mutex<ResponseState>,
    sends: AtomicUsize,
}

/// The response side of one dispatch cycle.
///
/// Clones share state, so a middleware that sets the status is observed by
/// the handler that runs after it. Sending twice is allowed and produces
/// duplicate traffic.
#[derive(Clone)]
pub struct SResponse {
    inner: Arc<ResponseInner>,
}

impl SResponse {
    /// Creates a response bound to `socket`.
    ///
    /// `route_path` is the event name used when [`event_name`](Self::event_name)
    /// is never called.
    pub fn new(socket: SocketRef, route_path: impl Into<String>, ack: Option<AckCallback>) -> Self {
        Self {
            inner: Arc::new(ResponseInner {
                socket,
                route_path: route_path.into(),
                ack,
                state: Mutex::new(ResponseState {
                    event_name: None,
                    status: StatusCode::OK,
                    message: String::new(),
                    data: Value::Null,
                }),
                sends: AtomicUsize::new(0),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Builder
    // -------------------------------------------------------------------------

    /// Sets the status code.
    pub fn status(&self, code: impl Into<StatusCode>) -> &Self {
        self.inner.state.lock().status = code.into();
        self
    }

    /// Sets the data payload.
    pub fn with_data(&self, data: impl Into<Value>) -> &Self {
        self.inner.state.lock().data = data.into();
        self
    }

    /// Serializes `data` and sets it as the payload.
    pub fn try_with_data<T: Serialize + ?Sized>(&self, data: &T) -> serde_json::Result<&Self> {
        let value = serde_json::to_value(data)?;
        self.inner.state.lock().data = value;
        Ok(self)
    }

    /// Sets the message string.
    pub fn message(&self, message: impl Into<String>) -> &Self {
        self.inner.state.lock().message = message.into();
        self
    }

    /// Overrides the outbound event name.
    pub fn event_name(&self, name: impl Into<String>) -> &Self {
        self.inner.state.lock().event_name = Some(name.into());
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn get_status(&self) -> StatusCode {
        self.inner.state.lock().status
    }

    pub fn get_message(&self) -> String {
        self.inner.state.lock().message.clone()
    }

    pub fn get_data(&self) -> Value {
        self.inner.state.lock().data.clone()
    }

    /// The event name the response will be emitted under.
    pub fn get_event_name(&self) -> String {
        self.inner
            .state
            .lock()
            .event_name
            .clone()
            .unwrap_or_else(|| self.inner.route_path.clone())
    }

    /// The socket that sent the originating event.
    pub fn socket(&self) -> &SocketRef {
        &self.inner.socket
    }

    /// Returns `true` if the client supplied an acknowledgement callback.
    pub fn has_ack(&self) -> bool {
        self.inner.ack.is_some()
    }

    /// Number of terminal sends performed so far.
    pub fn sent_count(&self) -> usize {
        self.inner.sends.load(Ordering::Acquire)
    }

    /// Returns `true` once any terminal send has been performed.
    pub fn is_sent(&self) -> bool {
        self.sent_count() > 0
    }

    /// Snapshot of the envelope a send would emit right now.
    pub fn envelope(&self) -> Envelope {
        let state = self.inner.state.lock();
        Envelope {
            message: state.message.clone(),
            status: state.status,
            payload: state.data.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Terminal sends
    // -------------------------------------------------------------------------

    /// Calls the acknowledgement callback with the current data payload.
    ///
    /// Without a callback this only logs a warning.
    pub fn invoke_ack(&self) {
        match &self.inner.ack {
            Some(ack) => {
                self.mark_sent();
                ack(vec![self.get_data()]);
            }
            None => {
                warn!(
                    socket_id = %self.inner.socket.id(),
                    event = %self.get_event_name(),
                    "Acknowledgement requested but the client supplied no callback"
                );
            }
        }
    }

    /// Emits the envelope to the sender.
    pub async fn to_sender(&self) -> TransportResult<()> {
        let (event, args) = self.outbound();
        trace!(event = %event, "Emitting to sender");
        self.inner.socket.emit(&event, args).await
    }

    /// Emits the envelope to every socket in the sender's namespace except
    /// the sender.
    pub async fn to_all_except_sender(&self) -> TransportResult<()> {
        let (event, args) = self.outbound();
        trace!(event = %event, "Broadcasting except sender");
        self.inner.socket.broadcast(&event, args).await
    }

    /// Emits the envelope to every member of `room` except the sender.
    pub async fn to_all_in_room_except_sender(&self, room: &str) -> TransportResult<()> {
        let (event, args) = self.outbound();
        trace!(event = %event, room, "Emitting to room except sender");
        self.inner.socket.to_room(room, &event, args).await
    }

    /// Emits the envelope to every member of `room`, sender included.
    ///
    /// The room is resolved in the sender's namespace.
    pub async fn to_all_in_room(&self, room: &str) -> TransportResult<()> {
        let (event, args) = self.outbound();
        trace!(event = %event, room, "Emitting to room");
        self.inner
            .socket
            .server()
            .emit_to_room(self.inner.socket.namespace(), room, &event, args)
            .await
    }

    /// Emits the envelope to every socket in `namespace`.
    pub async fn to_all_in_namespace(&self, namespace: &str) -> TransportResult<()> {
        let (event, args) = self.outbound();
        trace!(event = %event, namespace, "Emitting to namespace");
        self.inner
            .socket
            .server()
            .emit_to_namespace(namespace, &event, args)
            .await
    }

    /// Emits the envelope to every socket in the root namespace.
    pub async fn to_all_in_root_namespace(&self) -> TransportResult<()> {
        self.to_all_in_namespace(ROOT_NAMESPACE).await
    }

    /// Emits the envelope to the peer with connection id `socket_id`.
    ///
    /// Addressed through the peer's own room, so the sender never receives
    /// it even when addressing itself.
    pub async fn to_individual_socket(&self, socket_id: &str) -> TransportResult<()> {
        let (event, args) = self.outbound();
        trace!(event = %event, target = socket_id, "Emitting to individual socket");
        self.inner.socket.to_room(socket_id, &event, args).await
    }

    /// Reports `err` to the sender.
    ///
    /// Forces the status to 500 unless it already is 500 or above, and uses
    /// the error message as the response message.
    pub async fn error(&self, err: &HandlerError) -> TransportResult<()> {
        {
            let mut state = self.inner.state.lock();
            if !state.status.is_server_error() {
                state.status = StatusCode::INTERNAL_SERVER_ERROR;
            }
            state.message = err.message();
        }
        self.to_sender().await
    }

    fn outbound(&self) -> (String, Vec<Value>) {
        self.mark_sent();
        let event = self.get_event_name();
        (event, vec![self.envelope().into_value()])
    }

    fn mark_sent(&self) {
        self.inner.sends.fetch_add(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for SResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SResponse")
            .field("socket_id", &self.inner.socket.id())
            .field("route_path", &self.inner.route_path)
            .field("state", &*self.inner.state.lock())
            .field("has_ack", &self.has_ack())
            .field("sent", &self.sent_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockServer, Target, ack_recorder};

    #[tokio::test]
    async fn test_to_sender_uses_route_path_and_default_envelope() {
        let server = MockServer::new();
        let socket = server.connect("s1", "/");
        let response = SResponse::new(socket, "register", None);

        response.with_data(json!({"ok": true})).to_sender().await.unwrap();

        let emissions = server.emissions();
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].target, Target::Socket("s1".into()));
        assert_eq!(emissions[0].event, "register");
        assert_eq!(
            emissions[0].args,
            vec![json!({"message": "", "status": 200, "payload": {"ok": true}})]
        );
        assert_eq!(response.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_event_name_override() {
        let server = MockServer::new();
        let response = SResponse::new(server.connect("s1", "/"), "register", None);

        response
            .event_name("registered")
            .status(StatusCode::CREATED)
            .message("welcome")
            .to_sender()
            .await
            .unwrap();

        let emission = &server.emissions()[0];
        assert_eq!(emission.event, "registered");
        assert_eq!(
            emission.args[0],
            json!({"message": "welcome", "status": 201, "payload": null})
        );
    }

    #[tokio::test]
    async fn test_error_forces_500_and_sets_message() {
        let server = MockServer::new();
        let response = SResponse::new(server.connect("s1", "/"), "register", None);
        response.status(StatusCode::BAD_REQUEST);

        response.error(&HandlerError::msg("bad name")).await.unwrap();

        let envelope = &server.emissions()[0].args[0];
        assert_eq!(envelope["status"], json!(500));
        assert_eq!(envelope["message"], json!("bad name"));
    }

    #[tokio::test]
    async fn test_error_keeps_existing_server_error_status() {
        let server = MockServer::new();
        let response = SResponse::new(server.connect("s1", "/"), "register", None);
        response.status(503);

        response.error(&HandlerError::msg("down")).await.unwrap();

        assert_eq!(server.emissions()[0].args[0]["status"], json!(503));
    }

    #[test]
    fn test_invoke_ack_passes_data_payload() {
        let server = MockServer::new();
        let (ack, replies) = ack_recorder();
        let response = SResponse::new(server.connect("s1", "/"), "register", Some(ack));

        response.with_data(json!({"id": 7})).invoke_ack();

        assert_eq!(*replies.lock(), vec![vec![json!({"id": 7})]]);
        assert!(response.is_sent());
        assert!(server.emissions().is_empty());
    }

    #[test]
    fn test_invoke_ack_without_callback_is_noop() {
        let server = MockServer::new();
        let response = SResponse::new(server.connect("s1", "/"), "register", None);

        response.invoke_ack();

        assert!(!response.is_sent());
        assert!(server.emissions().is_empty());
    }

    #[tokio::test]
    async fn test_fan_out_targets() {
        let server = MockServer::new();
        let response = SResponse::new(server.connect("s1", "/chat"), "say", None);

        response.to_all_except_sender().await.unwrap();
        response.to_all_in_room_except_sender("lobby").await.unwrap();
        response.to_all_in_room("lobby").await.unwrap();
        response.to_all_in_namespace("/admin").await.unwrap();
        response.to_all_in_root_namespace().await.unwrap();
        response.to_individual_socket("s2").await.unwrap();

        let targets: Vec<Target> = server.emissions().into_iter().map(|e| e.target).collect();
        assert_eq!(
            targets,
            vec![
                Target::Broadcast {
                    namespace: "/chat".into(),
                    except: "s1".into(),
                },
                Target::Room {
                    namespace: "/chat".into(),
                    room: "lobby".into(),
                    except: Some("s1".into()),
                },
                Target::Room {
                    namespace: "/chat".into(),
                    room: "lobby".into(),
                    except: None,
                },
                Target::Namespace("/admin".into()),
                Target::Namespace("/".into()),
                Target::Room {
                    namespace: "/chat".into(),
                    room: "s2".into(),
                    except: Some("s1".into()),
                },
            ]
        );
        assert_eq!(response.sent_count(), 6);
    }

    #[tokio::test]
    async fn test_try_with_data_serializes() {
        #[derive(Serialize)]
        struct Reply {
            ok: bool,
        }

        let server = MockServer::new();
        let response = SResponse::new(server.connect("s1", "/"), "register", None);
        response.try_with_data(&Reply { ok: true }).unwrap();

        assert_eq!(response.get_data(), json!({"ok": true}));
    }
}
