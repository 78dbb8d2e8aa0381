//! Handler variants behind one invocation contract.
//!
//! Registration decides the shape of every route once and stores it as an
//! [`InternalRoute`]. Dispatch only ever calls [`InternalRoute::call_on`] and
//! [`InternalRoute::call_error`], which match exhaustively on the variant.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use srocket_core::{HandlerError, HandlerResult, SEvent, SRequest, SResponse, SocketRef};

use super::traits::{
    BoxedErrorFn, BoxedLifecycleFn, BoxedRouteFn, CallingConvention, ErrorFn, LifecycleFn,
    RouteFn, into_error_fn, into_lifecycle_fn, into_route_fn,
};

// ============================================================================
// RouteType
// ============================================================================

/// The shape a route was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteType {
    Function,
    Object,
    Class,
    Lifecycle,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Object => "object",
            Self::Class => "class",
            Self::Lifecycle => "lifecycle",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Function routes
// ============================================================================

/// A stateless handler function.
///
/// Function routes have no error counterpart; failures go straight to the
/// router's fallback response.
#[derive(Clone)]
pub struct FunctionRoute {
    convention: CallingConvention,
    handler: BoxedRouteFn,
}

impl FunctionRoute {
    pub fn new<F, T>(handler: F) -> Self
    where
        F: RouteFn<T>,
        T: 'static,
    {
        let (convention, handler) = into_route_fn(handler);
        Self {
            convention,
            handler,
        }
    }

    pub fn convention(&self) -> CallingConvention {
        self.convention
    }
}

// ============================================================================
// Object routes
// ============================================================================

struct ErrorHook {
    convention: CallingConvention,
    handler: BoxedErrorFn,
}

/// A handler with an optional error hook.
///
/// ```rust,ignore
/// let route = ObjectRoute::new(|req: SRequest, res: SResponse| async move {
///     res.with_data(req.arg(0).cloned().unwrap_or_default()).to_sender().await?;
///     Ok::<_, HandlerError>(())
/// })
/// .on_error(|err: HandlerError, event: SEvent| async move {
///     let _ = event.response.status(400).message(err.message()).to_sender().await;
/// });
/// ```
///
/// State shared between the two closures is captured by them; the same
/// captures serve every dispatch.
#[derive(Clone)]
pub struct ObjectRoute {
    convention: CallingConvention,
    on: BoxedRouteFn,
    on_error: Option<Arc<ErrorHook>>,
}

impl ObjectRoute {
    pub fn new<F, T>(on: F) -> Self
    where
        F: RouteFn<T>,
        T: 'static,
    {
        let (convention, on) = into_route_fn(on);
        Self {
            convention,
            on,
            on_error: None,
        }
    }

    /// Installs the error hook, replacing any previous one.
    pub fn on_error<F, T>(mut self, hook: F) -> Self
    where
        F: ErrorFn<T>,
        T: 'static,
    {
        let (convention, handler) = into_error_fn(hook);
        self.on_error = Some(Arc::new(ErrorHook {
            convention,
            handler,
        }));
        self
    }

    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    pub fn error_convention(&self) -> Option<CallingConvention> {
        self.on_error.as_ref().map(|hook| hook.convention)
    }

    pub fn has_error_hook(&self) -> bool {
        self.on_error.is_some()
    }
}

// ============================================================================
// Class routes
// ============================================================================

/// A handler type instantiated once when its route is registered.
///
/// The single instance serves every dispatch on every connection, so state
/// kept in it is shared by concurrent calls and needs its own
/// synchronization.
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Counter {
///     hits: AtomicUsize,
/// }
///
/// #[async_trait]
/// impl RouteClass for Counter {
///     async fn on(&self, _req: SRequest, res: SResponse) -> HandlerResult {
///         let hits = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
///         res.with_data(hits).to_sender().await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait RouteClass: Send + Sync + 'static {
    /// The convention [`on`](Self::on) and [`on_error`](Self::on_error) were
    /// written in.
    fn convention(&self) -> CallingConvention {
        CallingConvention::Args
    }

    /// Handles one event.
    async fn on(&self, request: SRequest, response: SResponse) -> HandlerResult;

    /// Handles a failure of [`on`](Self::on) or of a middleware.
    ///
    /// The default sends nothing, which leaves the router's fallback
    /// response in charge.
    async fn on_error(
        &self,
        _error: HandlerError,
        _request: SRequest,
        _response: SResponse,
    ) -> HandlerResult {
        Ok(())
    }
}

/// A class route taking a single [`SEvent`].
///
/// Same sharing rules as [`RouteClass`]; register it with
/// [`MemberValue::event_class`](crate::MemberValue::event_class).
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Echo;
///
/// #[async_trait]
/// impl EventRouteClass for Echo {
///     async fn on(&self, event: SEvent) -> HandlerResult {
///         let data = event.request.arg(0).cloned().unwrap_or_default();
///         event.response.with_data(data).to_sender().await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventRouteClass: Send + Sync + 'static {
    /// Handles one event.
    async fn on(&self, event: SEvent) -> HandlerResult;

    /// Handles a failure of [`on`](Self::on) or of a middleware.
    async fn on_error(&self, _error: HandlerError, _event: SEvent) -> HandlerResult {
        Ok(())
    }
}

/// Presents an [`EventRouteClass`] through the [`RouteClass`] contract.
pub(crate) struct EventClass<C>(pub(crate) C);

#[async_trait]
impl<C: EventRouteClass> RouteClass for EventClass<C> {
    fn convention(&self) -> CallingConvention {
        CallingConvention::Event
    }

    async fn on(&self, request: SRequest, response: SResponse) -> HandlerResult {
        self.0.on(SEvent::new(request, response)).await
    }

    async fn on_error(
        &self,
        error: HandlerError,
        request: SRequest,
        response: SResponse,
    ) -> HandlerResult {
        self.0.on_error(error, SEvent::new(request, response)).await
    }
}

/// Builds the instance of a class route at registration time.
pub type ClassFactory = Arc<dyn Fn() -> Arc<dyn RouteClass> + Send + Sync>;

/// A registered class route and the instance it owns.
#[derive(Clone)]
pub struct ClassRoute {
    convention: CallingConvention,
    instance: Arc<dyn RouteClass>,
}

impl ClassRoute {
    /// Instantiates the class through `factory`.
    pub fn instantiate(factory: &ClassFactory) -> Self {
        let instance = factory();
        Self {
            convention: instance.convention(),
            instance,
        }
    }

    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    /// The shared instance.
    pub fn instance(&self) -> &Arc<dyn RouteClass> {
        &self.instance
    }
}

// ============================================================================
// Lifecycle routes
// ============================================================================

/// A connect or disconnect hook, called with the raw connection only.
#[derive(Clone)]
pub struct LifecycleRoute {
    handler: BoxedLifecycleFn,
}

impl LifecycleRoute {
    pub fn new<F: LifecycleFn>(handler: F) -> Self {
        Self {
            handler: into_lifecycle_fn(handler),
        }
    }

    /// Calls the hook for `socket`.
    pub async fn call(&self, socket: SocketRef) -> HandlerResult {
        (self.handler)(socket).await
    }
}

// ============================================================================
// InternalRoute
// ============================================================================

/// One registered handler, whatever its shape.
#[derive(Clone)]
pub enum InternalRoute {
    Function(FunctionRoute),
    Object(ObjectRoute),
    Class(ClassRoute),
    Lifecycle(LifecycleRoute),
}

impl InternalRoute {
    pub fn route_type(&self) -> RouteType {
        match self {
            Self::Function(_) => RouteType::Function,
            Self::Object(_) => RouteType::Object,
            Self::Class(_) => RouteType::Class,
            Self::Lifecycle(_) => RouteType::Lifecycle,
        }
    }

    /// The calling convention of the main handler.
    ///
    /// Lifecycle hooks take neither form.
    pub fn convention(&self) -> Option<CallingConvention> {
        match self {
            Self::Function(route) => Some(route.convention),
            Self::Object(route) => Some(route.convention),
            Self::Class(route) => Some(route.convention),
            Self::Lifecycle(_) => None,
        }
    }

    /// Invokes the main handler.
    pub async fn call_on(&self, request: SRequest, response: SResponse) -> HandlerResult {
        match self {
            Self::Function(route) => (route.handler)(request, response).await,
            Self::Object(route) => (route.on)(request, response).await,
            Self::Class(route) => route.instance.on(request, response).await,
            Self::Lifecycle(route) => route.call(request.socket().clone()).await,
        }
    }

    /// Invokes the error counterpart, if the shape has one.
    pub async fn call_error(
        &self,
        error: HandlerError,
        request: SRequest,
        response: SResponse,
    ) -> HandlerResult {
        match self {
            Self::Function(_) | Self::Lifecycle(_) => Ok(()),
            Self::Object(route) => match &route.on_error {
                Some(hook) => (hook.handler)(error, request, response).await,
                None => Ok(()),
            },
            Self::Class(route) => route.instance.on_error(error, request, response).await,
        }
    }
}

impl fmt::Debug for InternalRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalRoute")
            .field("route_type", &self.route_type())
            .field("convention", &self.convention())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use serde_json::json;
    use srocket_core::testing::MockServer;

    fn pair(server: &Arc<MockServer>) -> (SRequest, SResponse) {
        let socket = server.connect("s1", "/");
        (
            SRequest::new(socket.clone(), "greet", vec![json!("Alice")]),
            SResponse::new(socket, "greet", None),
        )
    }

    #[tokio::test]
    async fn test_function_route_args_convention() {
        let route = InternalRoute::Function(FunctionRoute::new(
            |req: SRequest, res: SResponse| async move {
                res.with_data(req.arg(0).cloned().unwrap_or_default())
                    .to_sender()
                    .await?;
                Ok::<_, HandlerError>(())
            },
        ));
        assert_eq!(route.route_type(), RouteType::Function);
        assert_eq!(route.convention(), Some(CallingConvention::Args));

        let server = MockServer::new();
        let (req, res) = pair(&server);
        route.call_on(req, res).await.unwrap();

        assert_eq!(server.emissions()[0].args[0]["payload"], json!("Alice"));
    }

    #[tokio::test]
    async fn test_function_route_event_convention() {
        let route = FunctionRoute::new(|event: SEvent| async move {
            event.response.message(event.request.event_name().to_string());
        });
        assert_eq!(route.convention(), CallingConvention::Event);

        let server = MockServer::new();
        let (req, res) = pair(&server);
        InternalRoute::Function(route)
            .call_on(req, res.clone())
            .await
            .unwrap();

        assert_eq!(res.get_message(), "greet");
    }

    #[tokio::test]
    async fn test_function_route_call_error_is_noop() {
        let route = InternalRoute::Function(FunctionRoute::new(|_: SEvent| async {}));
        let server = MockServer::new();
        let (req, res) = pair(&server);

        route
            .call_error(HandlerError::msg("boom"), req, res)
            .await
            .unwrap();
        assert!(server.emissions().is_empty());
    }

    #[tokio::test]
    async fn test_object_route_error_hook_receives_error() {
        let route = ObjectRoute::new(|_: SRequest, _: SResponse| async {
            Err::<(), _>(HandlerError::msg("nope"))
        })
        .on_error(|err: HandlerError, event: SEvent| async move {
            event.response.status(400).message(err.message());
        });
        assert_eq!(route.error_convention(), Some(CallingConvention::Event));

        let route = InternalRoute::Object(route);
        let server = MockServer::new();
        let (req, res) = pair(&server);

        let err = route.call_on(req.clone(), res.clone()).await.unwrap_err();
        route.call_error(err, req, res.clone()).await.unwrap();

        assert_eq!(res.get_status().as_u16(), 400);
        assert_eq!(res.get_message(), "nope");
    }

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl RouteClass for Counter {
        async fn on(&self, _request: SRequest, response: SResponse) -> HandlerResult {
            let hits = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
            response.with_data(hits);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_class_route_reuses_instance() {
        let factory: ClassFactory = Arc::new(|| Arc::new(Counter::default()));
        let route = InternalRoute::Class(ClassRoute::instantiate(&factory));
        let server = MockServer::new();

        for expected in 1..=3 {
            let (req, res) = pair(&server);
            route.call_on(req, res.clone()).await.unwrap();
            assert_eq!(res.get_data(), json!(expected));
        }
    }

    #[derive(Default)]
    struct Shouter {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl EventRouteClass for Shouter {
        async fn on(&self, event: SEvent) -> HandlerResult {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if self.hits.load(Ordering::SeqCst) > 1 {
                return Err(HandlerError::msg("hoarse"));
            }
            event.response.message(event.request.event_name().to_uppercase());
            Ok(())
        }

        async fn on_error(&self, error: HandlerError, event: SEvent) -> HandlerResult {
            event.response.status(503).message(error.message());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_class_route_conventions_are_stored() {
        let args: ClassFactory = Arc::new(|| Arc::new(Counter::default()));
        let event: ClassFactory = Arc::new(|| Arc::new(EventClass(Shouter::default())));

        let args = InternalRoute::Class(ClassRoute::instantiate(&args));
        let event = InternalRoute::Class(ClassRoute::instantiate(&event));

        assert_eq!(args.convention(), Some(CallingConvention::Args));
        assert_eq!(event.convention(), Some(CallingConvention::Event));
    }

    #[tokio::test]
    async fn test_event_class_route_receives_event() {
        let factory: ClassFactory = Arc::new(|| Arc::new(EventClass(Shouter::default())));
        let route = InternalRoute::Class(ClassRoute::instantiate(&factory));
        let server = MockServer::new();

        let (req, res) = pair(&server);
        route.call_on(req, res.clone()).await.unwrap();
        assert_eq!(res.get_message(), "GREET");

        let (req, res) = pair(&server);
        let err = route.call_on(req.clone(), res.clone()).await.unwrap_err();
        route.call_error(err, req, res.clone()).await.unwrap();
        assert_eq!(res.get_status().as_u16(), 503);
        assert_eq!(res.get_message(), "hoarse");
    }

    #[tokio::test]
    async fn test_lifecycle_route_gets_socket_only() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let route = InternalRoute::Lifecycle(LifecycleRoute::new(move |socket: SocketRef| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(socket.id().to_string());
            }
        }));
        assert_eq!(route.convention(), None);

        let server = MockServer::new();
        let (req, res) = pair(&server);
        route.call_on(req, res).await.unwrap();

        assert_eq!(*seen.lock(), vec!["s1".to_string()]);
        assert!(server.emissions().is_empty());
    }
}
