//! SRocket Runtime - server facade for the SRocket event server.
//!
//! This crate provides:
//! - The [`SRocket`] server: controller registration, `listen`, `shutdown`, `run`
//! - Layered configuration ([`config`]) built on figment
//! - Logging initialisation ([`logging`]) built on tracing-subscriber
//!
//! ```ignore
//! use srocket_runtime::SRocket;
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

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, LoggingConfig, SRocketConfig, ServerConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{SRocket, SRocketBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
