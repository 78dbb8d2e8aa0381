//! Middleware pipeline.
//!
//! A middleware sees the shared request and response of a dispatch plus the
//! route's configuration, and decides whether the rest of the chain runs:
//!
//! ```rust,ignore
//! struct RequireName;
//!
//! #[async_trait]
//! impl Middleware for RequireName {
//!     async fn invoke(
//!         &self,
//!         request: &SRequest,
//!         response: &SResponse,
//!         _route: &RouteConfig,
//!         next: Next<'_>,
//!     ) -> HandlerResult {
//!         if request.arg(0).is_none() {
//!             // Respond and stop: the handler never runs.
//!             response.status(400).message("name required").to_sender().await?;
//!             return Ok(());
//!         }
//!         next.run().await
//!     }
//! }
//! ```
//!
//! [`Next::run`] resolves once everything after this middleware has finished,
//! so code placed after it observes the handler's effects. Returning an error
//! sends the dispatch down the route's error path.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use srocket_core::{HandlerResult, SRequest, SResponse};
use tracing::trace;

use crate::config::RouteConfig;

/// A unit of pre- or post-processing around a route handler.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Processes one dispatch.
    ///
    /// Call `next.run()` to continue, or return without calling it to stop
    /// the chain.
    async fn invoke(
        &self,
        request: &SRequest,
        response: &SResponse,
        route: &RouteConfig,
        next: Next<'_>,
    ) -> HandlerResult;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared middleware handle.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Final step of a chain, run once every middleware has called `next`.
pub type Endpoint<'a> = &'a (dyn Fn() -> BoxFuture<'a, HandlerResult> + Send + Sync);

/// The remainder of a middleware chain.
pub struct Next<'a> {
    chain: &'a [BoxedMiddleware],
    request: &'a SRequest,
    response: &'a SResponse,
    route: &'a RouteConfig,
    endpoint: Option<Endpoint<'a>>,
}

impl<'a> Next<'a> {
    /// Starts a chain over `chain`, finishing with `endpoint` if given.
    pub fn new(
        chain: &'a [BoxedMiddleware],
        request: &'a SRequest,
        response: &'a SResponse,
        route: &'a RouteConfig,
        endpoint: Option<Endpoint<'a>>,
    ) -> Self {
        Self {
            chain,
            request,
            response,
            route,
            endpoint,
        }
    }

    /// Number of middleware still ahead in the chain.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }

    /// Runs the rest of the chain.
    pub async fn run(self) -> HandlerResult {
        match self.chain.split_first() {
            Some((middleware, rest)) => {
                trace!(middleware = middleware.name(), path = %self.route.path, "Entering middleware");
                let next = Next {
                    chain: rest,
                    request: self.request,
                    response: self.response,
                    route: self.route,
                    endpoint: self.endpoint,
                };
                middleware
                    .invoke(self.request, self.response, self.route, next)
                    .await
            }
            None => match self.endpoint {
                Some(endpoint) => endpoint().await,
                None => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use srocket_core::HandlerError;
    use srocket_core::testing::MockServer;

    struct Record {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Record {
        async fn invoke(
            &self,
            _request: &SRequest,
            _response: &SResponse,
            _route: &RouteConfig,
            next: Next<'_>,
        ) -> HandlerResult {
            self.log.lock().push(format!("{}:before", self.label));
            let result = next.run().await;
            self.log.lock().push(format!("{}:after", self.label));
            result
        }
    }

    struct Stop;

    #[async_trait]
    impl Middleware for Stop {
        async fn invoke(
            &self,
            _request: &SRequest,
            response: &SResponse,
            _route: &RouteConfig,
            _next: Next<'_>,
        ) -> HandlerResult {
            response.status(401).to_sender().await?;
            Ok(())
        }
    }

    struct Fail;

    #[async_trait]
    impl Middleware for Fail {
        async fn invoke(
            &self,
            _request: &SRequest,
            _response: &SResponse,
            _route: &RouteConfig,
            _next: Next<'_>,
        ) -> HandlerResult {
            Err(HandlerError::msg("rejected"))
        }
    }

    fn recording_endpoint<'a>(
        log: &'a Mutex<Vec<String>>,
    ) -> impl Fn() -> BoxFuture<'a, HandlerResult> + Send + Sync + Copy + 'a {
        move || {
            log.lock().push("handler".into());
            Box::pin(async { Ok(()) }) as BoxFuture<'a, HandlerResult>
        }
    }

    fn flag_endpoint<'a>(
        flag: &'a AtomicBool,
    ) -> impl Fn() -> BoxFuture<'a, HandlerResult> + Send + Sync + Copy + 'a {
        move || {
            flag.store(true, Ordering::SeqCst);
            Box::pin(async { Ok(()) }) as BoxFuture<'a, HandlerResult>
        }
    }

    fn fixture() -> (Arc<MockServer>, SRequest, SResponse, RouteConfig) {
        let server = MockServer::new();
        let socket = server.connect("s1", "/");
        let request = SRequest::new(socket.clone(), "ping", vec![json!(1)]);
        let response = SResponse::new(socket, "ping", None);
        (server, request, response, RouteConfig::new("ping"))
    }

    #[tokio::test]
    async fn test_chain_runs_in_order_around_endpoint() {
        let (_server, request, response, route) = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<BoxedMiddleware> = vec![
            Arc::new(Record {
                label: "a",
                log: Arc::clone(&log),
            }),
            Arc::new(Record {
                label: "b",
                log: Arc::clone(&log),
            }),
        ];

        let endpoint = recording_endpoint(&log);

        Next::new(&chain, &request, &response, &route, Some(&endpoint))
            .run()
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["a:before", "b:before", "handler", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn test_chain_stops_when_next_not_called() {
        let (server, request, response, route) = fixture();
        let reached = AtomicBool::new(false);
        let chain: Vec<BoxedMiddleware> = vec![Arc::new(Stop)];

        let endpoint = flag_endpoint(&reached);

        Next::new(&chain, &request, &response, &route, Some(&endpoint))
            .run()
            .await
            .unwrap();

        assert!(!reached.load(Ordering::SeqCst));
        assert_eq!(server.emissions()[0].args[0]["status"], json!(401));
    }

    #[tokio::test]
    async fn test_chain_propagates_errors() {
        let (_server, request, response, route) = fixture();
        let chain: Vec<BoxedMiddleware> = vec![Arc::new(Fail)];

        let err = Next::new(&chain, &request, &response, &route, None)
            .run()
            .await
            .unwrap_err();
        assert_eq!(err.message(), "rejected");
    }

    #[tokio::test]
    async fn test_empty_chain_without_endpoint() {
        let (_server, request, response, route) = fixture();
        let next = Next::new(&[], &request, &response, &route, None);
        assert_eq!(next.remaining(), 0);
        assert!(next.run().await.is_ok());
    }
}
