//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A controller could not be registered.
    #[error("Registration error: {0}")]
    Registration(#[from] srocket_framework::RegistrationError),

    /// The transport failed to bind or serve.
    #[error("Transport error: {0}")]
    Transport(#[from] srocket_core::TransportError),

    /// `listen` was called while a listener is active.
    #[error("Server is already listening on {0}")]
    AlreadyListening(std::net::SocketAddr),

    /// `shutdown` was called without an active listener.
    #[error("Server is not listening")]
    NotListening,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
