//! # SRocket Framework
//!
//! Routing and dispatch for the SRocket event server.
//!
//! - **Registration**: controllers describe themselves with a
//!   [`ControllerDescriptor`]; the [`RouteMetadataStore`] classifies each
//!   member into a [`RouteType`] once and wraps it in an [`InternalRoute`].
//! - **Handlers**: functions, objects with an error hook, classes
//!   instantiated once, and connection lifecycle hooks, all behind
//!   [`InternalRoute::call_on`] / [`InternalRoute::call_error`].
//! - **Middleware**: cooperative before/after chains driven by [`Next`];
//!   [`ValidateArgs`] rejects malformed arguments before the handler runs.
//! - **Dispatch**: the [`Router`] resolves `(namespace, event)` pairs and runs
//!   the full cycle, containing every failure.
//!
//! ## Example
//!
//! ```rust,ignore
//! use srocket_framework::*;
//!
//! async fn register(req: SRequest, res: SResponse) -> HandlerResult {
//!     res.with_data(json!({ "ok": true })).to_sender().await?;
//!     Ok(())
//! }
//!
//! let mut store = RouteMetadataStore::new();
//! store.build_descriptor(
//!     ControllerDescriptor::new("Users")
//!         .route("register", MemberValue::function(register), UserRouteConfig::new()),
//! )?;
//!
//! let router = Router::new().register_routes(&store);
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod router;
pub mod store;
pub mod validation;

pub use config::{ControllerConfig, RouteConfig, UserRouteConfig};
pub use controller::{Controller, ControllerDescriptor, MemberDescriptor, MemberValue};
pub use error::{RegistrationError, RegistrationResult};
pub use handler::{
    CallingConvention, ClassRoute, ErrorFn, EventRouteClass, FunctionRoute, InternalRoute,
    IntoHandlerResult, LifecycleFn, LifecycleRoute, ObjectRoute, RouteClass, RouteFn, RouteType,
};
pub use middleware::{BoxedMiddleware, Middleware, Next};
pub use router::{DispatchOutcome, Router, UnhandledHook};
pub use store::{ControllerMetadata, RouteMetadata, RouteMetadataStore};
pub use validation::{ArgsCheck, ValidateArgs, ValidationError};
