//! # SRocket
//!
//! Controller-based event routing for WebSocket servers.
//!
//! ## Overview
//!
//! Handlers are grouped into controllers. Each controller lives in one
//! namespace, may share middleware between its routes and may watch
//! connections come and go. Inbound events are matched to routes by exact
//! name; the matched handler answers through an [`SResponse`] that can reach
//! the sender, a room, a namespace or everyone but the sender.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌────────┐     ┌────────────────────────────────────┐
//! │ Transport │────▶│ Router │────▶│ before middleware ─▶ handler ─▶ after │──▶ SResponse
//! │ (axum ws) │     │        │     └────────────────────────────────────┘
//! └───────────┘     └────────┘            │ error
//!                                         ▼
//!                                   error hook ─▶ 500 fallback
//! ```
//!
//! - **Runtime**: the [`SRocket`](prelude::SRocket) server, configuration and logging
//! - **Framework**: controllers, the route store, middleware and the router
//! - **Core**: request/response objects and the transport contract
//! - **Transport**: the WebSocket server
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use srocket::prelude::*;
//!
//! async fn register(request: SRequest, response: SResponse) -> HandlerResult {
//!     let name: String = request.parse_arg(0)?;
//!     response
//!         .status(StatusCode::CREATED)
//!         .with_data(json!({ "name": name }))
//!         .to_all_except_sender()
//!         .await?;
//!     Ok(())
//! }
//!
//! #[derive(Default)]
//! struct UserController;
//!
//! impl Controller for UserController {
//!     fn describe(self: Arc<Self>) -> ControllerDescriptor {
//!         ControllerDescriptor::new("UserController")
//!             .route("register", MemberValue::function(register), UserRouteConfig::new())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     SRocket::from_port(3000)
//!         .controller::<UserController>()
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default) / `yaml-config`: configuration file formats
//! - `json-log`: JSON log lines
//! - `test-util`: in-memory sockets for testing handlers
//!
//! [`SResponse`]: srocket_core::SResponse

pub use srocket_core as core;
pub use srocket_framework as framework;
pub use srocket_runtime as runtime;
pub use srocket_transport as transport;

pub use async_trait::async_trait;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use srocket::prelude::*;
/// ```
pub mod prelude {
    // Server - main entry point
    pub use srocket_runtime::{SRocket, SRocketConfig};

    // Controllers and routes
    pub use srocket_framework::{
        Controller, ControllerDescriptor, EventRouteClass, MemberDescriptor, MemberValue,
        ObjectRoute, RouteClass, RouteConfig, UserRouteConfig,
    };

    // Middleware
    pub use srocket_framework::{Middleware, Next, ValidateArgs};

    // Request/response objects and errors
    pub use srocket_core::{
        HandlerError, HandlerResult, SEvent, SRequest, SResponse, Socket, SocketRef, StatusCode,
    };

    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
