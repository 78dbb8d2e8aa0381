//! Handler system for the SRocket framework.
//!
//! - **Traits** ([`traits`]): the function signatures a route handler, an
//!   error hook or a lifecycle hook may have, and the [`CallingConvention`]
//!   each signature implies.
//! - **Routes** ([`route`]): the four handler shapes and the
//!   [`InternalRoute`] that dispatches over them.
//!
//! # Example
//!
//! ```rust,ignore
//! use srocket_framework::{FunctionRoute, ObjectRoute};
//!
//! async fn greet(req: SRequest, res: SResponse) -> HandlerResult {
//!     res.with_data(req.arg(0).cloned().unwrap_or_default())
//!         .to_sender()
//!         .await?;
//!     Ok(())
//! }
//!
//! let function = FunctionRoute::new(greet);
//! let object = ObjectRoute::new(greet).on_error(|err: HandlerError, event: SEvent| async move {
//!     let _ = event.response.status(400).message(err.message()).to_sender().await;
//! });
//! ```

pub mod route;
pub mod traits;

pub use route::{
    ClassFactory, ClassRoute, EventRouteClass, FunctionRoute, InternalRoute, LifecycleRoute,
    ObjectRoute, RouteClass, RouteType,
};
pub(crate) use route::EventClass;
pub use traits::{
    BoxedErrorFn, BoxedLifecycleFn, BoxedRouteFn, CallingConvention, ErrorFn, IntoHandlerResult,
    LifecycleFn, RouteFn, into_error_fn, into_lifecycle_fn, into_route_fn,
};
