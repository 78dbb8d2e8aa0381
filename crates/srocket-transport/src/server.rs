//! WebSocket server transport.
//!
//! One listener binds one TCP address and serves a single upgrade path:
//!
//! ```text
//! 0.0.0.0:3000
//! └── GET /socket?namespace=/chat  → WebSocket upgrade
//!      ├── send task   (mpsc → ws write half)
//!      └── recv loop   (ws read half → one task per event → ConnectionHandler)
//! ```
//!
//! Every text or binary frame is decoded as a [`Packet`]. Event packets are
//! forwarded to the [`ConnectionHandler`] whatever their name; an `ack` id on
//! an event becomes the event's acknowledgement callback.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        ConnectInfo, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use srocket_core::{
    AckCallback, BoxedConnectionHandler, ConnectionInfo, InboundEvent, ListenerHandle, Packet,
    ROOT_NAMESPACE, ServerTransport, SocketRef, TransportError, TransportResult,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::registry::WsServer;
use crate::socket::WsSocket;

/// Default upgrade path.
pub const DEFAULT_PATH: &str = "/socket";

/// Default capacity of each connection's outgoing queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

// ─── Transport ────────────────────────────────────────────────────────────────

/// Accepts WebSocket connections and reports them to a [`ConnectionHandler`].
///
/// [`ConnectionHandler`]: srocket_core::ConnectionHandler
#[derive(Debug, Clone)]
pub struct WsServerTransport {
    path: String,
    channel_capacity: usize,
}

impl WsServerTransport {
    /// Creates a transport serving upgrades at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            path,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Sets the capacity of each connection's outgoing queue.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }
}

impl Default for WsServerTransport {
    fn default() -> Self {
        Self::new(DEFAULT_PATH)
    }
}

/// State shared by the axum handler of one listener.
struct ListenerState {
    server: Arc<WsServer>,
    handler: BoxedConnectionHandler,
    channel_capacity: usize,
}

#[async_trait]
impl ServerTransport for WsServerTransport {
    async fn listen(
        &self,
        addr: &str,
        handler: BoxedConnectionHandler,
    ) -> TransportResult<ListenerHandle> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let shutdown_token = CancellationToken::new();
        let server = Arc::new(WsServer::new(shutdown_token.clone()));
        let state = Arc::new(ListenerState {
            server: Arc::clone(&server),
            handler,
            channel_capacity: self.channel_capacity,
        });

        let router = Router::new()
            .route(&self.path, get(ws_dispatch))
            .with_state(state);

        let token = shutdown_token.clone();
        tokio::spawn(async move {
            let serve = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            );
            tokio::select! {
                result = serve => {
                    if let Err(e) = result {
                        error!(error = %e, "WebSocket server error");
                    }
                }
                () = token.cancelled() => {
                    info!(addr = %local_addr, "WebSocket server shutting down");
                }
            }
        });

        info!(addr = %local_addr, path = %self.path, "WebSocket server listening");
        Ok(ListenerHandle::new(local_addr, server, shutdown_token))
    }
}

// ─── Upgrade ──────────────────────────────────────────────────────────────────

/// Resolves the requested namespace, defaulting to the root namespace.
fn normalize_namespace(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        None | Some("") => ROOT_NAMESPACE.to_string(),
        Some(ns) if ns.starts_with('/') => ns.to_string(),
        Some(ns) => format!("/{ns}"),
    }
}

async fn ws_dispatch(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ListenerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let namespace = normalize_namespace(query.get("namespace").map(String::as_str));

    let mut info = ConnectionInfo::new("websocket").with_remote_addr(addr.to_string());
    for (name, value) in &headers {
        if let Ok(v) = value.to_str() {
            info = info.with_metadata(name.as_str().to_lowercase(), v);
        }
    }

    debug!(remote_addr = %addr, namespace = %namespace, "New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_connection(state, socket, namespace, info))
}

// ─── Connection ───────────────────────────────────────────────────────────────

async fn handle_connection(
    state: Arc<ListenerState>,
    socket: WebSocket,
    namespace: String,
    info: ConnectionInfo,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let id = Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::channel::<String>(state.channel_capacity);
    let ws_socket = Arc::new(WsSocket::new(
        id.clone(),
        namespace.clone(),
        info,
        Arc::clone(&state.server),
        tx,
    ));
    let shutdown_token = ws_socket.shutdown_token().clone();
    state.server.register(Arc::clone(&ws_socket));

    info!(socket_id = %id, namespace = %namespace, "WebSocket connection established");

    // ── Send task: drains the outgoing queue into the write half ─────────────
    let send_token = shutdown_token.clone();
    let send_id = id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                frame = rx.recv() => {
                    let Some(text) = frame else { break };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        warn!(socket_id = %send_id, "Failed to send frame, connection closed");
                        break;
                    }
                }
                () = send_token.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let socket_ref: SocketRef = Arc::clone(&ws_socket) as SocketRef;
    state.handler.on_connect(Arc::clone(&socket_ref)).await;

    // ── Receive loop: forwards inbound frames to the handler ─────────────────
    // Each event runs on its own task so a suspended handler does not hold
    // back later frames of the same connection.
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => {
                debug!(socket_id = %id, "Connection closed by server");
                break;
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    warn!(socket_id = %id, error = %e, "Event task ended abnormally");
                }
            }
            frame = ws_rx.next() => {
                let Some(frame) = frame else { break };
                match frame {
                    Ok(Message::Text(text)) => {
                        dispatch_frame(&state, &ws_socket, text.as_bytes(), &mut in_flight);
                    }
                    Ok(Message::Binary(data)) => {
                        dispatch_frame(&state, &ws_socket, &data, &mut in_flight);
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {
                        trace!(socket_id = %id, "Received ping/pong");
                    }
                    Ok(Message::Close(_)) => {
                        info!(socket_id = %id, "WebSocket connection closed by client");
                        break;
                    }
                    Err(e) => {
                        warn!(socket_id = %id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    // ── Cleanup ──────────────────────────────────────────────────────────────
    // Handlers still running finish on their own; their sends fail once the
    // queue is gone.
    if !in_flight.is_empty() {
        debug!(socket_id = %id, pending = in_flight.len(), "Detaching in-flight events");
    }
    in_flight.detach_all();
    shutdown_token.cancel();
    state.server.unregister(&namespace, &id);
    state.handler.on_disconnect(socket_ref).await;
    let _ = send_task.await;
    info!(socket_id = %id, namespace = %namespace, "WebSocket connection closed");
}

/// Decodes one frame and spawns the dispatch of an event packet.
fn dispatch_frame(
    state: &Arc<ListenerState>,
    socket: &Arc<WsSocket>,
    data: &[u8],
    in_flight: &mut JoinSet<()>,
) {
    match Packet::decode(data) {
        Ok(Packet::Event { event, args, ack }) => {
            trace!(socket_id = %socket.id_str(), event = %event, "Received event");
            let mut inbound = InboundEvent::new(event, args);
            if let Some(ack_id) = ack {
                inbound = inbound.with_ack(ack_callback(socket, ack_id));
            }
            let state = Arc::clone(state);
            let socket = Arc::clone(socket) as SocketRef;
            in_flight.spawn(async move {
                state.handler.on_event(socket, inbound).await;
            });
        }
        Ok(Packet::Ack { id, .. }) => {
            debug!(socket_id = %socket.id_str(), ack_id = id, "Ignoring acknowledgement from client");
        }
        Err(e) => {
            warn!(socket_id = %socket.id_str(), error = %e, "Dropping malformed frame");
        }
    }
}

/// Builds the callback that answers an event carrying `ack_id`.
fn ack_callback(socket: &WsSocket, ack_id: u64) -> AckCallback {
    let tx = socket.sender();
    let socket_id = socket.id_str().to_string();
    Arc::new(move |args| {
        let result = Packet::ack(ack_id, args).encode().and_then(|frame| {
            tx.try_send(frame)
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        });
        if let Err(e) = result {
            warn!(socket_id = %socket_id, ack_id, error = %e, "Failed to send acknowledgement");
        }
    })
}
