//! Unified error types for the SRocket core.
//!
//! This module provides the error types shared by every layer: transport
//! failures raised while emitting, and the boxed [`HandlerError`] that carries
//! whatever a route handler or middleware failed with.
//! Registration errors live in `srocket-framework`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A boxed error that any handler failure can be converted into.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur in transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection closed before the packet could be queued.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Packet send failed.
    #[error("failed to send packet: {0}")]
    SendFailed(String),

    /// An inbound frame could not be decoded into a packet.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// The addressed socket is not connected.
    #[error("socket '{id}' not found")]
    SocketNotFound {
        /// The missing socket ID.
        id: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPacket(err.to_string())
    }
}

// =============================================================================
// Handler Errors
// =============================================================================

/// An error raised inside a dispatch cycle by a handler or a middleware.
///
/// Any `std::error::Error` converts into a `HandlerError`, so handlers can use
/// `?` on their own error types. Plain messages go through [`HandlerError::msg`].
/// Panics caught by the router are represented as well.
///
/// Cloning is cheap: the error hook and the fallback response both receive
/// the same underlying error.
#[derive(Clone)]
pub struct HandlerError {
    inner: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl HandlerError {
    /// Wraps an arbitrary error.
    pub fn new(err: impl Into<BoxError>) -> Self {
        let boxed: BoxError = err.into();
        Self {
            inner: Arc::from(boxed),
        }
    }

    /// Creates an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(message)
    }

    /// Builds an error from the payload of a caught panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::msg(message)
    }

    /// Returns the message reported to clients by [`SResponse::error`](crate::SResponse::error).
    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    /// Attempts to downcast the underlying error.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type returned by handlers, error hooks and middleware.
pub type HandlerResult = Result<(), HandlerError>;
