//! Transport abstraction layer for SRocket.
//!
//! The transport itself (accepting connections, framing, timeouts) lives in
//! `srocket-transport`. This module defines the boundary the router is written
//! against: sockets and servers to emit through, the wire packet format, and
//! the handler a transport reports connections and events to.

pub mod connection;
pub mod packet;
pub mod socket;

pub use connection::{
    BoxedConnectionHandler, ConnectionHandler, InboundEvent, ListenerHandle, ServerTransport,
};
pub use packet::Packet;
pub use socket::{
    AckCallback, ConnectionInfo, ROOT_NAMESPACE, Server, ServerRef, Socket, SocketRef,
};
