//! Error types for route registration.

use thiserror::Error;

/// Errors raised while building controller metadata.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    /// A member carries route metadata but has no handler shape.
    #[error("member '{member}' of controller '{controller}' is not a routable handler")]
    RouteTypeError {
        /// Controller name.
        controller: String,
        /// Offending member name.
        member: String,
    },

    /// The resolved route path is empty.
    #[error("member '{member}' of controller '{controller}' resolves to an empty path")]
    EmptyPath {
        /// Controller name.
        controller: String,
        /// Offending member name.
        member: String,
    },

    /// Two members of the same controller resolve to the same path.
    #[error("controller '{controller}' registers path '{path}' more than once")]
    DuplicatePath {
        /// Controller name.
        controller: String,
        /// The repeated path.
        path: String,
    },
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
