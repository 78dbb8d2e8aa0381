//! Argument validation middleware.
//!
//! [`ValidateArgs`] deserializes the full argument list of an event into a
//! typed value before the handler runs. An event whose arguments do not fit
//! is answered to its sender with a `400` envelope and never reaches the
//! handler:
//!
//! ```rust,ignore
//! #[derive(Deserialize)]
//! struct Registration {
//!     name: String,
//! }
//!
//! UserRouteConfig::new().middleware(
//!     ValidateArgs::<(Registration,)>::new()
//!         .check(|(reg,)| if reg.name.is_empty() { Err("name is empty".into()) } else { Ok(()) }),
//! )
//! ```
//!
//! Tuples match positional arguments one to one; `Vec<T>` accepts any
//! number of arguments of one shape.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use srocket_core::{HandlerResult, SRequest, SResponse, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::config::RouteConfig;
use crate::middleware::{Middleware, Next};

/// Why an argument list was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The arguments do not deserialize into the expected shape.
    #[error("invalid arguments: {0}")]
    Shape(String),

    /// The arguments have the right shape but a check refused them.
    #[error("{0}")]
    Rejected(String),
}

/// Extra rule applied to arguments that already have the right shape.
pub type ArgsCheck<T> = Arc<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

/// Middleware that only lets well-formed argument lists through.
pub struct ValidateArgs<T> {
    check: Option<ArgsCheck<T>>,
    status: StatusCode,
    _shape: PhantomData<fn() -> T>,
}

impl<T> ValidateArgs<T>
where
    T: DeserializeOwned + 'static,
{
    pub fn new() -> Self {
        Self {
            check: None,
            status: StatusCode::BAD_REQUEST,
            _shape: PhantomData,
        }
    }

    /// Adds a rule run after deserialization; `Err` carries the message
    /// sent back to the client.
    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    /// Status of the rejection envelope. Defaults to `400`.
    pub fn status(mut self, status: impl Into<StatusCode>) -> Self {
        self.status = status.into();
        self
    }

    /// Validates an argument list and returns the typed value.
    pub fn validate(&self, args: &[Value]) -> Result<T, ValidationError> {
        let value: T = serde_json::from_value(Value::Array(args.to_vec()))
            .map_err(|e| ValidationError::Shape(e.to_string()))?;
        if let Some(check) = &self.check {
            check(&value).map_err(ValidationError::Rejected)?;
        }
        Ok(value)
    }
}

impl<T> Default for ValidateArgs<T>
where
    T: DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Middleware for ValidateArgs<T>
where
    T: DeserializeOwned + 'static,
{
    async fn invoke(
        &self,
        request: &SRequest,
        response: &SResponse,
        route: &RouteConfig,
        next: Next<'_>,
    ) -> HandlerResult {
        let verdict = self.validate(request.data()).map(drop);
        match verdict {
            Ok(()) => next.run().await,
            Err(err) => {
                debug!(path = %route.path, error = %err, "Rejected event arguments");
                response
                    .status(self.status)
                    .message(err.to_string())
                    .to_sender()
                    .await?;
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "ValidateArgs"
    }
}
