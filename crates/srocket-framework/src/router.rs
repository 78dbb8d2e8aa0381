//! Dispatch engine.
//!
//! The [`Router`] indexes every route of a [`RouteMetadataStore`] by
//! namespace and exact event name, and drives each inbound event through one
//! dispatch cycle:
//!
//! ```text
//! lookup ─▶ SRequest/SResponse ─▶ before chain ─▶ call_on ─▶ after chain
//!                                      │              │            │
//!                                      └──── error ───┴────────────┴─▶ call_error ─▶ fallback
//! ```
//!
//! The before chain is global middleware, then controller middleware, then
//! the route's own. The after chain is the route's after-middleware followed
//! by global after-middleware, and only runs once the handler completed.
//! Every failure, panics included, stays inside the cycle.
//!
//! # Tower Service Integration
//!
//! `Router` implements `tower::Service<(SocketRef, InboundEvent)>`, so tower
//! layers can wrap the whole dispatch:
//!
//! ```rust,ignore
//! let service = ServiceBuilder::new()
//!     .concurrency_limit(64)
//!     .service(router);
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use srocket_core::{
    ConnectionHandler, HandlerError, HandlerResult, InboundEvent, SRequest, SResponse, SocketRef,
};
use tower::Service;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::config::ControllerConfig;
use crate::handler::{InternalRoute, LifecycleRoute};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::store::{RouteMetadata, RouteMetadataStore};

/// Observer for events no route answers to.
///
/// Receives a request and a response whose default event name is the
/// unresolved event's own name. Sending through the response is allowed.
pub type UnhandledHook = Arc<dyn Fn(SRequest, SResponse) -> BoxFuture<'static, ()> + Send + Sync>;

/// How a dispatch cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler and every after-middleware completed.
    Completed,
    /// A before-middleware returned without calling `next`.
    Halted,
    /// A handler or middleware failed and the error path ran.
    Failed,
    /// No route matched the event.
    Unresolved,
}

struct RouteEntry {
    controller: String,
    metadata: RouteMetadata,
    controller_config: Arc<ControllerConfig>,
}

#[derive(Clone, Default)]
struct RouterInner {
    routes: HashMap<String, HashMap<String, Arc<RouteEntry>>>,
    connect_handlers: HashMap<String, Vec<LifecycleRoute>>,
    disconnect_handlers: HashMap<String, Vec<LifecycleRoute>>,
    global_before: Vec<BoxedMiddleware>,
    global_after: Vec<BoxedMiddleware>,
    unhandled: Option<UnhandledHook>,
}

/// Routes inbound events to registered handlers.
///
/// Cloning is cheap; clones share the same route index.
#[derive(Clone, Default)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner_mut(&mut self) -> &mut RouterInner {
        Arc::make_mut(&mut self.inner)
    }

    /// Appends middleware run before every route.
    pub fn before(mut self, middleware: impl Middleware) -> Self {
        self.inner_mut().global_before.push(Arc::new(middleware));
        self
    }

    /// Appends middleware run after every completed handler.
    pub fn after(mut self, middleware: impl Middleware) -> Self {
        self.inner_mut().global_after.push(Arc::new(middleware));
        self
    }

    /// Appends shared global middleware lists.
    pub fn global_middleware(
        mut self,
        before: impl IntoIterator<Item = BoxedMiddleware>,
        after: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> Self {
        let inner = self.inner_mut();
        inner.global_before.extend(before);
        inner.global_after.extend(after);
        self
    }

    /// Installs the observer for unresolved events.
    pub fn on_unhandled<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(SRequest, SResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.unhandled_hook(Arc::new(move |req, res| Box::pin(hook(req, res))))
    }

    /// Installs an already boxed observer for unresolved events.
    pub fn unhandled_hook(mut self, hook: UnhandledHook) -> Self {
        self.inner_mut().unhandled = Some(hook);
        self
    }

    /// Indexes every controller of `store`.
    ///
    /// A path registered again in the same namespace replaces the earlier
    /// route.
    pub fn register_routes(mut self, store: &RouteMetadataStore) -> Self {
        let inner = self.inner_mut();

        for controller in store.controllers() {
            let namespace = controller.namespace.clone();

            inner
                .connect_handlers
                .entry(namespace.clone())
                .or_default()
                .extend(controller.connect_handlers.iter().cloned());
            inner
                .disconnect_handlers
                .entry(namespace.clone())
                .or_default()
                .extend(controller.disconnect_handlers.iter().cloned());

            let routes = inner.routes.entry(namespace.clone()).or_default();
            for metadata in &controller.message_routes {
                let entry = Arc::new(RouteEntry {
                    controller: controller.name.clone(),
                    metadata: metadata.clone(),
                    controller_config: Arc::clone(&controller.config),
                });
                if let Some(previous) = routes.insert(metadata.path().to_string(), entry) {
                    warn!(
                        namespace = %namespace,
                        path = %metadata.path(),
                        previous = %previous.controller,
                        controller = %controller.name,
                        "Route path registered twice, last registration wins"
                    );
                }
            }

            info!(
                controller = %controller.name,
                namespace = %namespace,
                routes = controller.message_routes.len(),
                "Controller routes indexed"
            );
        }

        self
    }

    /// Looks up the route answering `path` in `namespace`.
    pub fn resolve(&self, namespace: &str, path: &str) -> Option<&RouteMetadata> {
        self.inner
            .routes
            .get(namespace)?
            .get(path)
            .map(|entry| &entry.metadata)
    }

    /// Number of indexed routes across all namespaces.
    pub fn route_count(&self) -> usize {
        self.inner.routes.values().map(HashMap::len).sum()
    }

    /// Runs one inbound event through a full dispatch cycle.
    pub async fn route(&self, socket: SocketRef, event: InboundEvent) -> DispatchOutcome {
        let span = info_span!(
            "dispatch",
            event = %event.name,
            namespace = %socket.namespace(),
            socket_id = %socket.id(),
        );
        self.route_inner(socket, event).instrument(span).await
    }

    async fn route_inner(&self, socket: SocketRef, event: InboundEvent) -> DispatchOutcome {
        let InboundEvent { name, args, ack } = event;

        let entry = self
            .inner
            .routes
            .get(socket.namespace())
            .and_then(|routes| routes.get(&name))
            .cloned();

        let Some(entry) = entry else {
            debug!("No route registered for event, dropping");
            if let Some(hook) = &self.inner.unhandled {
                let request = SRequest::new(Arc::clone(&socket), name.clone(), args);
                let response = SResponse::new(socket, name, ack);
                if let Err(panic) = AssertUnwindSafe(hook(request, response))
                    .catch_unwind()
                    .await
                {
                    let err = HandlerError::from_panic(panic);
                    error!(error = %err, "Unhandled-event hook panicked");
                }
            }
            return DispatchOutcome::Unresolved;
        };

        trace!(
            controller = %entry.controller,
            route_type = %entry.metadata.route_type(),
            "Route resolved"
        );

        let request = SRequest::new(Arc::clone(&socket), name, args);
        let response = SResponse::new(socket, entry.metadata.path(), ack);
        self.dispatch(&entry, request, response).await
    }

    async fn dispatch(
        &self,
        entry: &RouteEntry,
        request: SRequest,
        response: SResponse,
    ) -> DispatchOutcome {
        let config = &*entry.metadata.config;
        let handler = &*entry.metadata.handler;

        let before: Vec<BoxedMiddleware> = self
            .inner
            .global_before
            .iter()
            .chain(&entry.controller_config.middleware)
            .chain(&config.before_middleware)
            .cloned()
            .collect();

        let completed = AtomicBool::new(false);
        let call_on = handler_endpoint(handler, &request, &response, &completed);
        let chain = Next::new(&before, &request, &response, config, Some(&call_on));
        let result = guarded(chain.run()).await;

        match result {
            Err(err) => {
                self.handle_error(handler, err, &request, &response).await;
                return DispatchOutcome::Failed;
            }
            Ok(()) if !completed.load(Ordering::Acquire) => {
                debug!("Middleware ended the chain before the handler");
                return DispatchOutcome::Halted;
            }
            Ok(()) => {}
        }

        let after: Vec<BoxedMiddleware> = config
            .after_middleware
            .iter()
            .chain(&self.inner.global_after)
            .cloned()
            .collect();

        if !after.is_empty() {
            let chain = Next::new(&after, &request, &response, config, None);
            if let Err(err) = guarded(chain.run()).await {
                self.handle_error(handler, err, &request, &response).await;
                return DispatchOutcome::Failed;
            }
        }

        DispatchOutcome::Completed
    }

    async fn handle_error(
        &self,
        handler: &InternalRoute,
        err: HandlerError,
        request: &SRequest,
        response: &SResponse,
    ) {
        error!(route_type = %handler.route_type(), error = %err, "Dispatch failed");

        let sent_before = response.sent_count();
        let hook = handler.call_error(err.clone(), request.clone(), response.clone());
        if let Err(hook_err) = guarded(hook).await {
            error!(error = %hook_err, "Error hook failed");
        }

        if response.sent_count() == sent_before {
            if let Err(e) = response.error(&err).await {
                warn!(error = %e, "Failed to send error response");
            }
        }
    }

    async fn run_lifecycle(&self, handlers: Option<&Vec<LifecycleRoute>>, socket: SocketRef) {
        for handler in handlers.into_iter().flatten() {
            if let Err(err) = guarded(handler.call(Arc::clone(&socket))).await {
                error!(socket_id = %socket.id(), error = %err, "Lifecycle hook failed");
            }
        }
    }
}

fn handler_endpoint<'a>(
    handler: &'a InternalRoute,
    request: &'a SRequest,
    response: &'a SResponse,
    completed: &'a AtomicBool,
) -> impl Fn() -> BoxFuture<'a, HandlerResult> + Send + Sync + Copy + 'a {
    move || {
        Box::pin(async move {
            handler.call_on(request.clone(), response.clone()).await?;
            completed.store(true, Ordering::Release);
            Ok(())
        }) as BoxFuture<'a, HandlerResult>
    }
}

async fn guarded<F>(fut: F) -> HandlerResult
where
    F: Future<Output = HandlerResult>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(HandlerError::from_panic(panic)),
    }
}

#[async_trait]
impl ConnectionHandler for Router {
    async fn on_connect(&self, socket: SocketRef) {
        debug!(socket_id = %socket.id(), namespace = %socket.namespace(), "Connection established");
        let handlers = self.inner.connect_handlers.get(socket.namespace());
        self.run_lifecycle(handlers, socket).await;
    }

    async fn on_event(&self, socket: SocketRef, event: InboundEvent) {
        self.route(socket, event).await;
    }

    async fn on_disconnect(&self, socket: SocketRef) {
        debug!(socket_id = %socket.id(), namespace = %socket.namespace(), "Connection closed");
        let handlers = self.inner.disconnect_handlers.get(socket.namespace());
        self.run_lifecycle(handlers, socket).await;
    }
}

// ============================================================================
// Tower Service Implementation for Router
// ============================================================================

impl Service<(SocketRef, InboundEvent)> for Router {
    type Response = DispatchOutcome;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, (socket, event): (SocketRef, InboundEvent)) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.route(socket, event).await) })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::config::{RouteConfig, UserRouteConfig};
    use crate::controller::{ControllerDescriptor, MemberValue};
    use crate::handler::{ObjectRoute, RouteClass};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use srocket_core::testing::{MockServer, MockSocket, Target, ack_recorder};
    use srocket_core::SEvent;
    use tokio_test::assert_ok;
    use tower::ServiceExt;

    struct Tag {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Tag {
        async fn invoke(
            &self,
            _request: &SRequest,
            _response: &SResponse,
            _route: &RouteConfig,
            next: Next<'_>,
        ) -> HandlerResult {
            self.log.lock().push(self.label.to_string());
            next.run().await
        }
    }

    struct Deny;

    #[async_trait]
    impl Middleware for Deny {
        async fn invoke(
            &self,
            _request: &SRequest,
            response: &SResponse,
            _route: &RouteConfig,
            _next: Next<'_>,
        ) -> HandlerResult {
            response.status(403).message("denied").to_sender().await?;
            Ok(())
        }
    }

    fn tag(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Tag {
        Tag {
            label,
            log: Arc::clone(log),
        }
    }

    fn router_for(descriptors: Vec<ControllerDescriptor>) -> Router {
        let mut store = RouteMetadataStore::new();
        for descriptor in descriptors {
            store.build_descriptor(descriptor).unwrap();
        }
        Router::new().register_routes(&store)
    }

    fn event(name: &str, args: Vec<Value>) -> InboundEvent {
        InboundEvent::new(name, args)
    }

    fn envelope_of(server: &MockServer, index: usize) -> Value {
        server.emissions()[index].args[0].clone()
    }

    async fn register(_req: SRequest, res: SResponse) -> HandlerResult {
        res.with_data(json!({"ok": true})).to_sender().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_register_example_emits_envelope_to_sender() {
        let router = router_for(vec![ControllerDescriptor::new("Users").route(
            "register",
            MemberValue::function(register),
            UserRouteConfig::new(),
        )]);
        let server = MockServer::new();
        let socket: Arc<MockSocket> = server.connect("s1", "/");

        let outcome = router
            .route(socket, event("register", vec![json!("Alice")]))
            .await;

        assert_eq!(outcome, DispatchOutcome::Completed);
        let emissions = server.emissions();
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].target, Target::Socket("s1".into()));
        assert_eq!(emissions[0].event, "register");
        assert_eq!(
            emissions[0].args,
            vec![json!({"message": "", "status": 200, "payload": {"ok": true}})]
        );
    }

    #[tokio::test]
    async fn test_exact_path_match_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let router = router_for(vec![ControllerDescriptor::new("C").route(
            "ping",
            MemberValue::function(move |_: SEvent| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
            UserRouteConfig::new(),
        )]);
        let server = MockServer::new();

        router.route(server.connect("s1", "/"), event("ping", vec![])).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        for other in ["Ping", "ping ", "pong", ""] {
            let outcome = router.route(server.connect("s1", "/"), event(other, vec![])).await;
            assert_eq!(outcome, DispatchOutcome::Unresolved);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(server.emissions().is_empty());
    }

    #[tokio::test]
    async fn test_middleware_order_and_after_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);

        let descriptor = ControllerDescriptor::new("C")
            .middleware(tag("controller-1", &log))
            .middleware(tag("controller-2", &log))
            .route(
                "work",
                MemberValue::function(move |_: SRequest, _: SResponse| {
                    let log = Arc::clone(&handler_log);
                    async move {
                        log.lock().push("handler".to_string());
                    }
                }),
                UserRouteConfig::new()
                    .middleware(tag("route-1", &log))
                    .middleware(tag("route-2", &log))
                    .after(tag("after-1", &log))
                    .after(tag("after-2", &log)),
            );

        let mut store = RouteMetadataStore::new();
        store.build_descriptor(descriptor).unwrap();
        let router = Router::new()
            .before(tag("global", &log))
            .after(tag("global-after", &log))
            .register_routes(&store);

        let server = MockServer::new();
        let outcome = router.route(server.connect("s1", "/"), event("work", vec![])).await;

        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(
            *log.lock(),
            vec![
                "global",
                "controller-1",
                "controller-2",
                "route-1",
                "route-2",
                "handler",
                "after-1",
                "after-2",
                "global-after",
            ]
        );
    }

    #[tokio::test]
    async fn test_halted_chain_skips_handler_and_after() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);
        let router = router_for(vec![ControllerDescriptor::new("C").middleware(Deny).route(
            "secret",
            MemberValue::function(move |_: SEvent| {
                let log = Arc::clone(&handler_log);
                async move {
                    log.lock().push("handler".to_string());
                }
            }),
            UserRouteConfig::new().after(tag("after", &log)),
        )]);
        let server = MockServer::new();

        let outcome = router.route(server.connect("s1", "/"), event("secret", vec![])).await;

        assert_eq!(outcome, DispatchOutcome::Halted);
        assert!(log.lock().is_empty());
        let envelope = envelope_of(&server, 0);
        assert_eq!(envelope["status"], json!(403));
        assert_eq!(envelope["message"], json!("denied"));
    }

    #[tokio::test]
    async fn test_function_route_error_falls_back_to_500() {
        let router = router_for(vec![ControllerDescriptor::new("C").route(
            "explode",
            MemberValue::function(|_: SRequest, _: SResponse| async {
                Err::<(), _>(HandlerError::msg("database unavailable"))
            }),
            UserRouteConfig::new(),
        )]);
        let server = MockServer::new();

        let outcome = router.route(server.connect("s1", "/"), event("explode", vec![])).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        let emissions = server.emissions();
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].event, "explode");
        assert_eq!(
            emissions[0].args[0],
            json!({"message": "database unavailable", "status": 500, "payload": null})
        );
    }

    #[tokio::test]
    async fn test_failed_handler_skips_after_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);

        let descriptor = ControllerDescriptor::new("C").route(
            "explode",
            MemberValue::function(move |_: SRequest, _: SResponse| {
                let log = Arc::clone(&handler_log);
                async move {
                    log.lock().push("handler".to_string());
                    Err::<(), _>(HandlerError::msg("boom"))
                }
            }),
            UserRouteConfig::new()
                .middleware(tag("before", &log))
                .after(tag("after", &log)),
        );
        let mut store = RouteMetadataStore::new();
        store.build_descriptor(descriptor).unwrap();
        let router = Router::new()
            .after(tag("global-after", &log))
            .register_routes(&store);
        let server = MockServer::new();

        let outcome = router.route(server.connect("s1", "/"), event("explode", vec![])).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(*log.lock(), vec!["before", "handler"]);
        assert_eq!(envelope_of(&server, 0)["status"], json!(500));
    }

    #[tokio::test]
    async fn test_error_hook_response_suppresses_fallback() {
        let router = router_for(vec![ControllerDescriptor::new("C").route(
            "login",
            MemberValue::object(
                ObjectRoute::new(|_: SRequest, _: SResponse| async {
                    Err::<(), _>(HandlerError::msg("bad password"))
                })
                .on_error(|err: HandlerError, _: SRequest, res: SResponse| async move {
                    res.status(401).message(err.message()).to_sender().await?;
                    Ok::<_, HandlerError>(())
                }),
            ),
            UserRouteConfig::new(),
        )]);
        let server = MockServer::new();

        router.route(server.connect("s1", "/"), event("login", vec![])).await;

        let emissions = server.emissions();
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].args[0]["status"], json!(401));
        assert_eq!(emissions[0].args[0]["message"], json!("bad password"));
    }

    #[tokio::test]
    async fn test_silent_error_hook_gets_fallback() {
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hook_calls);
        let router = router_for(vec![ControllerDescriptor::new("C").route(
            "login",
            MemberValue::object(
                ObjectRoute::new(|_: SRequest, _: SResponse| async {
                    Err::<(), _>(HandlerError::msg("bad password"))
                })
                .on_error(move |_: HandlerError, _: SEvent| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            ),
            UserRouteConfig::new(),
        )]);
        let server = MockServer::new();

        router.route(server.connect("s1", "/"), event("login", vec![])).await;

        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
        let envelope = envelope_of(&server, 0);
        assert_eq!(envelope["status"], json!(500));
        assert_eq!(envelope["message"], json!("bad password"));
    }

    #[tokio::test]
    async fn test_middleware_error_goes_to_error_path() {
        struct Reject;

        #[async_trait]
        impl Middleware for Reject {
            async fn invoke(
                &self,
                _request: &SRequest,
                _response: &SResponse,
                _route: &RouteConfig,
                _next: Next<'_>,
            ) -> HandlerResult {
                Err(HandlerError::msg("token expired"))
            }
        }

        let router = router_for(vec![ControllerDescriptor::new("C").route(
            "me",
            MemberValue::function(register),
            UserRouteConfig::new().middleware(Reject),
        )]);
        let server = MockServer::new();

        let outcome = router.route(server.connect("s1", "/"), event("me", vec![])).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(envelope_of(&server, 0)["message"], json!("token expired"));
        assert_eq!(server.emissions().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let router = router_for(vec![ControllerDescriptor::new("C").route(
            "crash",
            MemberValue::function(|_: SEvent| async {
                panic!("handler exploded") as ()
            }),
            UserRouteConfig::new(),
        )]);
        let server = MockServer::new();

        let outcome = router.route(server.connect("s1", "/"), event("crash", vec![])).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        let envelope = envelope_of(&server, 0);
        assert_eq!(envelope["status"], json!(500));
        assert_eq!(envelope["message"], json!("handler exploded"));
    }

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl RouteClass for Counter {
        async fn on(&self, _request: SRequest, response: SResponse) -> HandlerResult {
            let hits = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
            response.with_data(hits).to_sender().await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_class_route_instance_shared_across_connections() {
        let router = router_for(vec![ControllerDescriptor::new("C").route(
            "count",
            MemberValue::class::<Counter>(),
            UserRouteConfig::new(),
        )]);
        let server = MockServer::new();

        router.route(server.connect("s1", "/"), event("count", vec![])).await;
        router.route(server.connect("s2", "/"), event("count", vec![])).await;

        assert_eq!(envelope_of(&server, 0)["payload"], json!(1));
        assert_eq!(envelope_of(&server, 1)["payload"], json!(2));
    }

    #[tokio::test]
    async fn test_ack_round_trip() {
        let router = router_for(vec![ControllerDescriptor::new("C").route(
            "echo",
            MemberValue::function(|req: SRequest, res: SResponse| async move {
                res.with_data(req.arg(0).cloned().unwrap_or_default())
                    .invoke_ack();
            }),
            UserRouteConfig::new(),
        )]);
        let server = MockServer::new();
        let (ack, replies) = ack_recorder();

        router
            .route(
                server.connect("s1", "/"),
                event("echo", vec![json!("hi")]).with_ack(ack),
            )
            .await;

        assert_eq!(*replies.lock(), vec![vec![json!("hi")]]);
        assert!(server.emissions().is_empty());
    }

    #[tokio::test]
    async fn test_routes_are_scoped_by_namespace() {
        let router = router_for(vec![
            ControllerDescriptor::new("Chat").namespace("/chat").route(
                "say",
                MemberValue::function(|_: SRequest, res: SResponse| async move {
                    res.with_data("chat").to_sender().await
                }),
                UserRouteConfig::new(),
            ),
            ControllerDescriptor::new("Admin").namespace("/admin").route(
                "say",
                MemberValue::function(|_: SRequest, res: SResponse| async move {
                    res.with_data("admin").to_sender().await
                }),
                UserRouteConfig::new(),
            ),
        ]);
        let server = MockServer::new();

        router.route(server.connect("a", "/admin"), event("say", vec![])).await;
        router.route(server.connect("c", "/chat"), event("say", vec![])).await;
        let root = router.route(server.connect("r", "/"), event("say", vec![])).await;

        assert_eq!(envelope_of(&server, 0)["payload"], json!("admin"));
        assert_eq!(envelope_of(&server, 1)["payload"], json!("chat"));
        assert_eq!(root, DispatchOutcome::Unresolved);
        assert_eq!(router.route_count(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_path_across_controllers_last_wins() {
        let router = router_for(vec![
            ControllerDescriptor::new("First").route(
                "ping",
                MemberValue::function(|_: SRequest, res: SResponse| async move {
                    res.with_data("first").to_sender().await
                }),
                UserRouteConfig::new(),
            ),
            ControllerDescriptor::new("Second").route(
                "ping",
                MemberValue::function(|_: SRequest, res: SResponse| async move {
                    res.with_data("second").to_sender().await
                }),
                UserRouteConfig::new(),
            ),
        ]);
        let server = MockServer::new();

        router.route(server.connect("s1", "/"), event("ping", vec![])).await;

        assert_eq!(router.route_count(), 1);
        assert_eq!(envelope_of(&server, 0)["payload"], json!("second"));
    }

    #[tokio::test]
    async fn test_unhandled_hook_observes_dropped_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut store = RouteMetadataStore::new();
        store
            .build_descriptor(ControllerDescriptor::new("C"))
            .unwrap();
        let router = Router::new()
            .on_unhandled(move |req: SRequest, _res: SResponse| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().push(req.event_name().to_string());
                }
            })
            .register_routes(&store);
        let server = MockServer::new();

        let outcome = router.route(server.connect("s1", "/"), event("nowhere", vec![])).await;

        assert_eq!(outcome, DispatchOutcome::Unresolved);
        assert_eq!(*seen.lock(), vec!["nowhere".to_string()]);
        assert!(server.emissions().is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_hooks_follow_namespace() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let on_connect = Arc::clone(&log);
        let on_disconnect = Arc::clone(&log);
        let router = router_for(vec![
            ControllerDescriptor::new("Chat")
                .namespace("/chat")
                .on_connect(move |socket: SocketRef| {
                    let log = Arc::clone(&on_connect);
                    async move {
                        log.lock().push(format!("connect:{}", socket.id()));
                    }
                })
                .on_disconnect(move |socket: SocketRef| {
                    let log = Arc::clone(&on_disconnect);
                    async move {
                        log.lock().push(format!("disconnect:{}", socket.id()));
                    }
                }),
        ]);
        let server = MockServer::new();
        let chat = server.connect("c1", "/chat");
        let root = server.connect("r1", "/");

        router.on_connect(chat.clone()).await;
        router.on_connect(root.clone()).await;
        router.on_disconnect(chat).await;
        router.on_disconnect(root).await;

        assert_eq!(*log.lock(), vec!["connect:c1", "disconnect:c1"]);
    }

    #[tokio::test]
    async fn test_router_as_tower_service() {
        let router = router_for(vec![ControllerDescriptor::new("C").route(
            "register",
            MemberValue::function(register),
            UserRouteConfig::new(),
        )]);
        let server = MockServer::new();
        let socket: SocketRef = server.connect("s1", "/");

        let outcome = assert_ok!(router.oneshot((socket, event("register", vec![]))).await);

        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(server.emissions().len(), 1);
    }

    #[test]
    fn test_resolve() {
        let router = router_for(vec![ControllerDescriptor::new("C").namespace("/x").route(
            "a",
            MemberValue::function(register),
            UserRouteConfig::new().path("alpha"),
        )]);

        assert!(router.resolve("/x", "alpha").is_some());
        assert!(router.resolve("/x", "a").is_none());
        assert!(router.resolve("/", "alpha").is_none());
    }
}
