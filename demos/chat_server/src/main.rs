//! Chat Server Example
//!
//! A chat room server showing each kind of SRocket route:
//!
//! - `register` (function route): announces a name to everyone else and
//!   acknowledges the sender when it asked for an ack; `ValidateArgs`
//!   rejects a missing or blank name before the handler runs
//! - `message` (object route): relays a message to a room, with an error
//!   hook answering bad payloads
//! - `stats` (class route): counts requests in a shared instance
//!
//! Connecting and disconnecting sockets are tracked by the controller, and
//! every dispatch is logged by a global middleware.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package chat-server -- --port 3000
//! ```
//!
//! Clients connect to `ws://localhost:3000/socket?namespace=/chat` and send
//! frames such as `{"event":"register","args":["alice"],"ack":1}`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use srocket::prelude::*;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "chat-server", about = "A chat room server built on SRocket")]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Configuration file, layered under the command-line options.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs every dispatch and how it ended.
struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn invoke(
        &self,
        request: &SRequest,
        response: &SResponse,
        route: &RouteConfig,
        next: Next<'_>,
    ) -> HandlerResult {
        debug!(
            socket = request.socket().id(),
            route = %route.path,
            "Dispatching"
        );
        let result = next.run().await;
        info!(
            socket = request.socket().id(),
            event = request.event_name(),
            status = %response.get_status(),
            sent = response.sent_count(),
            ok = result.is_ok(),
            "Handled"
        );
        result
    }
}

// ============================================================================
// Routes
// ============================================================================

fn register_args() -> ValidateArgs<(String,)> {
    ValidateArgs::<(String,)>::new().check(|(name,)| {
        if name.trim().is_empty() {
            Err("name required".to_string())
        } else {
            Ok(())
        }
    })
}

async fn register(request: SRequest, response: SResponse) -> HandlerResult {
    let name: String = request.parse_arg(0)?;
    response
        .status(StatusCode::CREATED)
        .message("registered")
        .with_data(json!({ "name": name }))
        .to_all_except_sender()
        .await?;
    response.invoke_ack();
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    room: String,
    text: String,
}

fn message_route() -> ObjectRoute {
    ObjectRoute::new(|event: SEvent| async move {
        let message: ChatMessage = event.request.parse_arg(0)?;
        event.request.socket().join(&message.room);
        event
            .response
            .event_name("message")
            .with_data(json!({
                "from": event.request.socket().id(),
                "room": &message.room,
                "text": &message.text,
            }))
            .to_all_in_room(&message.room)
            .await?;
        Ok::<_, HandlerError>(())
    })
    .on_error(
        |error: HandlerError, _request: SRequest, response: SResponse| async move {
            response
                .status(StatusCode::UNPROCESSABLE_ENTITY)
                .message(format!("invalid message: {error}"))
                .to_sender()
                .await
        },
    )
}

/// Counts `stats` requests across every connection.
#[derive(Default)]
struct Stats {
    requests: AtomicUsize,
}

#[async_trait]
impl RouteClass for Stats {
    async fn on(&self, request: SRequest, response: SResponse) -> HandlerResult {
        let requests = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        let online = request.socket().server().socket_count();
        response
            .with_data(json!({ "requests": requests, "online": online }))
            .to_sender()
            .await?;
        Ok(())
    }
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Default)]
struct ChatController {
    connected: AtomicUsize,
}

impl Controller for ChatController {
    fn describe(self: Arc<Self>) -> ControllerDescriptor {
        let on_connect = Arc::clone(&self);
        let on_disconnect = Arc::clone(&self);

        ControllerDescriptor::new("ChatController")
            .namespace("/chat")
            .on_connect(move |socket: SocketRef| {
                let this = Arc::clone(&on_connect);
                async move {
                    let total = this.connected.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(socket = socket.id(), total, "Joined chat");
                }
            })
            .on_disconnect(move |socket: SocketRef| {
                let this = Arc::clone(&on_disconnect);
                async move {
                    let total = this.connected.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
                    info!(socket = socket.id(), total, "Left chat");
                }
            })
            .route(
                "register",
                MemberValue::function(register),
                UserRouteConfig::new().middleware(register_args()),
            )
            .route(
                "message",
                MemberValue::object(message_route()),
                UserRouteConfig::new(),
            )
            .route(
                "stats",
                MemberValue::class::<Stats>(),
                UserRouteConfig::new().path("chat:stats"),
            )
            .member(MemberDescriptor::new(
                "motd",
                MemberValue::data("Welcome to the chat"),
            ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = SRocket::builder().set("server.port", args.port);
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }

    let server = builder
        .build()?
        .controller::<ChatController>()
        .before(LoggingMiddleware)
        .on_unhandled(|request: SRequest, _response: SResponse| async move {
            debug!(event = request.event_name(), "No route for event");
        });

    info!("Starting chat server on port {}", args.port);
    server.run().await?;
    info!("Chat server stopped");

    Ok(())
}
