//! Route and controller configuration records.

use std::fmt;
use std::sync::Arc;

use crate::middleware::{BoxedMiddleware, Middleware};

/// Route options supplied by the author of a controller member.
///
/// Everything is optional; the path falls back to the member name.
#[derive(Clone, Default)]
pub struct UserRouteConfig {
    pub path: Option<String>,
    pub middleware: Vec<BoxedMiddleware>,
    pub after_middleware: Vec<BoxedMiddleware>,
}

impl UserRouteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit event path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Appends a before-middleware.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends an after-middleware.
    pub fn after(mut self, middleware: impl Middleware) -> Self {
        self.after_middleware.push(Arc::new(middleware));
        self
    }

    /// Resolves the final route configuration for member `name`.
    pub fn resolve(self, name: &str) -> RouteConfig {
        RouteConfig {
            path: self.path.unwrap_or_else(|| name.to_string()),
            before_middleware: self.middleware,
            after_middleware: self.after_middleware,
        }
    }
}

/// Resolved configuration of one route.
#[derive(Clone)]
pub struct RouteConfig {
    /// Event name the route answers to.
    pub path: String,
    /// Runs after controller middleware, before the handler.
    pub before_middleware: Vec<BoxedMiddleware>,
    /// Runs after the handler completed.
    pub after_middleware: Vec<BoxedMiddleware>,
}

impl RouteConfig {
    /// A configuration with no middleware.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            before_middleware: Vec::new(),
            after_middleware: Vec::new(),
        }
    }
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("path", &self.path)
            .field("before_middleware", &self.before_middleware.len())
            .field("after_middleware", &self.after_middleware.len())
            .finish()
    }
}

/// Controller-wide configuration.
#[derive(Clone, Default)]
pub struct ControllerConfig {
    /// Runs before every route's own middleware.
    pub middleware: Vec<BoxedMiddleware>,
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("middleware", &self.middleware.len())
            .finish()
    }
}
