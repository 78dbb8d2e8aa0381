//! Handler function traits.
//!
//! A route handler is any async function with one of two signatures:
//!
//! ```rust,ignore
//! // Two-argument convention
//! async fn register(request: SRequest, response: SResponse) -> HandlerResult { .. }
//!
//! // Unified-event convention
//! async fn register(event: SEvent) { .. }
//! ```
//!
//! The signature picks the [`CallingConvention`] once, when the function is
//! boxed; nothing inspects the handler at dispatch time.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use srocket_core::{HandlerError, HandlerResult, SEvent, SRequest, SResponse, SocketRef};

// ============================================================================
// CallingConvention
// ============================================================================

/// How a handler wants its request and response delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// `(request, response)` as two arguments.
    Args,
    /// A single [`SEvent`] bundling both.
    Event,
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Args => f.write_str("args"),
            Self::Event => f.write_str("event"),
        }
    }
}

// ============================================================================
// IntoHandlerResult
// ============================================================================

/// Types a handler may return.
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E: Into<HandlerError>> IntoHandlerResult for Result<(), E> {
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

// ============================================================================
// Boxed forms
// ============================================================================

/// Type-erased route handler, always called with the two-argument form.
pub type BoxedRouteFn =
    Arc<dyn Fn(SRequest, SResponse) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Type-erased error hook.
pub type BoxedErrorFn = Arc<
    dyn Fn(HandlerError, SRequest, SResponse) -> BoxFuture<'static, HandlerResult> + Send + Sync,
>;

/// Type-erased connection lifecycle hook.
pub type BoxedLifecycleFn =
    Arc<dyn Fn(SocketRef) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

// ============================================================================
// RouteFn
// ============================================================================

/// An async function usable as a route handler.
///
/// `T` only disambiguates the two blanket implementations.
pub trait RouteFn<T>: Send + Sync + 'static {
    /// The convention this signature uses.
    const CONVENTION: CallingConvention;

    /// Calls the handler.
    fn call(&self, request: SRequest, response: SResponse) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, Res> RouteFn<(SRequest, SResponse)> for F
where
    F: Fn(SRequest, SResponse) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoHandlerResult + 'static,
{
    const CONVENTION: CallingConvention = CallingConvention::Args;

    fn call(&self, request: SRequest, response: SResponse) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(request, response);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

impl<F, Fut, Res> RouteFn<(SEvent,)> for F
where
    F: Fn(SEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoHandlerResult + 'static,
{
    const CONVENTION: CallingConvention = CallingConvention::Event;

    fn call(&self, request: SRequest, response: SResponse) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(SEvent::new(request, response));
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

/// Boxes a route handler and reports its convention.
pub fn into_route_fn<F, T>(f: F) -> (CallingConvention, BoxedRouteFn)
where
    F: RouteFn<T>,
    T: 'static,
{
    (F::CONVENTION, Arc::new(move |req, res| f.call(req, res)))
}

// ============================================================================
// ErrorFn
// ============================================================================

/// An async function usable as an error hook.
///
/// Receives the error that ended the dispatch plus the same request and
/// response, in either convention.
pub trait ErrorFn<T>: Send + Sync + 'static {
    const CONVENTION: CallingConvention;

    fn call(
        &self,
        error: HandlerError,
        request: SRequest,
        response: SResponse,
    ) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, Res> ErrorFn<(HandlerError, SRequest, SResponse)> for F
where
    F: Fn(HandlerError, SRequest, SResponse) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoHandlerResult + 'static,
{
    const CONVENTION: CallingConvention = CallingConvention::Args;

    fn call(
        &self,
        error: HandlerError,
        request: SRequest,
        response: SResponse,
    ) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(error, request, response);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

impl<F, Fut, Res> ErrorFn<(HandlerError, SEvent)> for F
where
    F: Fn(HandlerError, SEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoHandlerResult + 'static,
{
    const CONVENTION: CallingConvention = CallingConvention::Event;

    fn call(
        &self,
        error: HandlerError,
        request: SRequest,
        response: SResponse,
    ) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(error, SEvent::new(request, response));
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

/// Boxes an error hook and reports its convention.
pub fn into_error_fn<F, T>(f: F) -> (CallingConvention, BoxedErrorFn)
where
    F: ErrorFn<T>,
    T: 'static,
{
    (
        F::CONVENTION,
        Arc::new(move |err, req, res| f.call(err, req, res)),
    )
}

// ============================================================================
// LifecycleFn
// ============================================================================

/// An async function called with the raw connection on connect or
/// disconnect.
pub trait LifecycleFn: Send + Sync + 'static {
    fn call(&self, socket: SocketRef) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, Res> LifecycleFn for F
where
    F: Fn(SocketRef) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoHandlerResult + 'static,
{
    fn call(&self, socket: SocketRef) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(socket);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

/// Boxes a lifecycle hook.
pub fn into_lifecycle_fn<F: LifecycleFn>(f: F) -> BoxedLifecycleFn {
    Arc::new(move |socket| f.call(socket))
}
