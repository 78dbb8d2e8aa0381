//! Configuration module for the SRocket runtime.
//!
//! This module provides layered configuration loading (files, environment,
//! programmatic overrides) and validation for the server and logging
//! settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LoggingConfig, SRocketConfig, ServerConfig, SpanEventConfig,
};
pub use validation::validate_config;
