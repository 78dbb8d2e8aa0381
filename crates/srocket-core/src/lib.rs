//! # SRocket Core
//!
//! Shared building blocks of the SRocket event server.
//!
//! This crate defines the two boundaries every other crate meets at:
//!
//! - **Transport boundary**: the [`Socket`], [`Server`] and
//!   [`ConnectionHandler`] traits a transport implements and the router
//!   consumes, plus the JSON [`Packet`] framing.
//! - **Handler boundary**: the per-dispatch value objects [`SRequest`],
//!   [`SResponse`] and [`SEvent`], and the [`HandlerError`] everything a
//!   handler or middleware fails with.
//!
//! ## Data Flow
//!
//! ```text
//! ┌───────────┐  InboundEvent  ┌────────┐  SRequest/SResponse  ┌─────────┐
//! │ Transport │───────────────▶│ Router │─────────────────────▶│ Handler │
//! └───────────┘                └────────┘                      └─────────┘
//!       ▲                                                           │
//!       └────────────────── Envelope {message, status, payload} ────┘
//! ```
//!
//! Enable the `test-util` feature for in-memory [`testing`] doubles.

pub mod error;
pub mod io;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{BoxError, HandlerError, HandlerResult, TransportError, TransportResult};
pub use io::{Envelope, SEvent, SRequest, SResponse, StatusCode};
pub use transport::{
    AckCallback, BoxedConnectionHandler, ConnectionHandler, ConnectionInfo, InboundEvent,
    ListenerHandle, Packet, ROOT_NAMESPACE, Server, ServerRef, ServerTransport, Socket, SocketRef,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::{HandlerError, HandlerResult};
    pub use super::io::{SEvent, SRequest, SResponse, StatusCode};
    pub use super::transport::{Socket, SocketRef};
}
