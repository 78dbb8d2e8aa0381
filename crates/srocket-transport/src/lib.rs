//! # SRocket Transport
//!
//! WebSocket server transport for the SRocket event server.
//!
//! This crate implements the transport boundary defined in `srocket-core`:
//! [`WsServerTransport`] accepts connections over axum's WebSocket upgrade and
//! reports them to a [`ConnectionHandler`], handing out one [`WsSocket`] per
//! connection. Sockets are grouped by namespace (the `namespace` query
//! parameter of the upgrade request) and can join rooms; each socket starts
//! out in a room named after its own id.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  srocket-framework  │  (Router: ConnectionHandler)
//! ├─────────────────────┤
//! │  srocket-core       │  (Socket / Server / ServerTransport traits)
//! ├─────────────────────┤
//! │  srocket-transport  │  <- This crate (axum WebSocket)
//! ├─────────────────────┤
//! │  Network (TCP)      │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use srocket_transport::WsServerTransport;
//! use srocket_core::ServerTransport;
//!
//! let transport = WsServerTransport::new("/socket").with_channel_capacity(256);
//! let handle = transport.listen("0.0.0.0:3000", router).await?;
//! println!("listening on {}", handle.local_addr);
//! ```
//!
//! [`ConnectionHandler`]: srocket_core::ConnectionHandler

#[cfg(feature = "ws-server")]
mod registry;
#[cfg(feature = "ws-server")]
mod server;
#[cfg(feature = "ws-server")]
mod socket;

#[cfg(feature = "ws-server")]
pub use registry::WsServer;
#[cfg(feature = "ws-server")]
pub use server::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_PATH, WsServerTransport};
#[cfg(feature = "ws-server")]
pub use socket::WsSocket;
