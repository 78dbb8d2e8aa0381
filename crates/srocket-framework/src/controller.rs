//! Controller descriptors.
//!
//! A controller groups routes under one namespace, shares middleware between
//! them and may watch connections come and go. Its metadata is plain data
//! built with [`ControllerDescriptor`]:
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct UserController {
//!     online: AtomicUsize,
//! }
//!
//! impl Controller for UserController {
//!     fn describe(self: Arc<Self>) -> ControllerDescriptor {
//!         let this = Arc::clone(&self);
//!         ControllerDescriptor::new("UserController")
//!             .namespace("/users")
//!             .middleware(LoggingMiddleware)
//!             .on_connect(move |_socket: SocketRef| {
//!                 let this = Arc::clone(&this);
//!                 async move { this.online.fetch_add(1, Ordering::SeqCst); }
//!             })
//!             .member(
//!                 MemberDescriptor::new("register", MemberValue::function(register))
//!                     .route(UserRouteConfig::new()),
//!             )
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::UserRouteConfig;
use crate::handler::{
    ClassFactory, EventClass, EventRouteClass, FunctionRoute, LifecycleFn, LifecycleRoute,
    ObjectRoute, RouteClass, RouteFn,
};
use crate::middleware::{BoxedMiddleware, Middleware};

// ============================================================================
// Members
// ============================================================================

/// The raw value of a controller member.
#[derive(Clone)]
pub enum MemberValue {
    /// A handler function.
    Function(FunctionRoute),
    /// A handler with an optional error hook.
    Object(ObjectRoute),
    /// A handler type, instantiated once at registration.
    Class(ClassFactory),
    /// A plain value with no handler shape.
    Data(Value),
}

impl MemberValue {
    pub fn function<F, T>(handler: F) -> Self
    where
        F: RouteFn<T>,
        T: 'static,
    {
        Self::Function(FunctionRoute::new(handler))
    }

    pub fn object(route: ObjectRoute) -> Self {
        Self::Object(route)
    }

    /// A class route built with `C::default()`.
    pub fn class<C: RouteClass + Default>() -> Self {
        Self::Class(Arc::new(|| Arc::new(C::default()) as Arc<dyn RouteClass>))
    }

    /// A class route built by `factory`.
    pub fn class_with<C, F>(factory: F) -> Self
    where
        C: RouteClass,
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self::Class(Arc::new(move || Arc::new(factory()) as Arc<dyn RouteClass>))
    }

    /// A class route taking a single event, built with `C::default()`.
    pub fn event_class<C: EventRouteClass + Default>() -> Self {
        Self::Class(Arc::new(|| {
            Arc::new(EventClass(C::default())) as Arc<dyn RouteClass>
        }))
    }

    /// A class route taking a single event, built by `factory`.
    pub fn event_class_with<C, F>(factory: F) -> Self
    where
        C: EventRouteClass,
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self::Class(Arc::new(move || {
            Arc::new(EventClass(factory())) as Arc<dyn RouteClass>
        }))
    }

    pub fn data(value: impl Into<Value>) -> Self {
        Self::Data(value.into())
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Function(_) => "function",
            Self::Object(_) => "object",
            Self::Class(_) => "class",
            Self::Data(_) => "data",
        }
    }
}

impl fmt::Debug for MemberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(value) => f.debug_tuple("Data").field(value).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// One named member of a controller.
///
/// Only members carrying a route configuration become routes.
#[derive(Clone)]
pub struct MemberDescriptor {
    pub name: String,
    pub value: MemberValue,
    pub route: Option<UserRouteConfig>,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, value: MemberValue) -> Self {
        Self {
            name: name.into(),
            value,
            route: None,
        }
    }

    /// Marks the member as a route.
    pub fn route(mut self, config: UserRouteConfig) -> Self {
        self.route = Some(config);
        self
    }

    /// Returns `true` if the member is marked as a route.
    pub fn is_route(&self) -> bool {
        self.route.is_some()
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("is_route", &self.is_route())
            .finish()
    }
}

// ============================================================================
// Controllers
// ============================================================================

/// Everything the store needs to register one controller.
#[derive(Clone)]
pub struct ControllerDescriptor {
    pub name: String,
    pub namespace: Option<String>,
    pub middleware: Vec<BoxedMiddleware>,
    pub members: Vec<MemberDescriptor>,
    pub on_connect: Vec<LifecycleRoute>,
    pub on_disconnect: Vec<LifecycleRoute>,
}

impl ControllerDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            middleware: Vec::new(),
            members: Vec::new(),
            on_connect: Vec::new(),
            on_disconnect: Vec::new(),
        }
    }

    /// Places every route of the controller in `namespace`.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Appends controller-level middleware.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared middleware.
    pub fn middleware_arc(mut self, middleware: BoxedMiddleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Shorthand for a member marked as a route.
    pub fn route(self, name: impl Into<String>, value: MemberValue, config: UserRouteConfig) -> Self {
        self.member(MemberDescriptor::new(name, value).route(config))
    }

    /// Adds a hook run when a connection joins the controller's namespace.
    pub fn on_connect<F: LifecycleFn>(mut self, handler: F) -> Self {
        self.on_connect.push(LifecycleRoute::new(handler));
        self
    }

    /// Adds a hook run when a connection leaves the controller's namespace.
    pub fn on_disconnect<F: LifecycleFn>(mut self, handler: F) -> Self {
        self.on_disconnect.push(LifecycleRoute::new(handler));
        self
    }
}

impl fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("middleware", &self.middleware.len())
            .field("members", &self.members)
            .field("on_connect", &self.on_connect.len())
            .field("on_disconnect", &self.on_disconnect.len())
            .finish()
    }
}

/// A type that describes itself as a controller.
///
/// The store creates one instance with `Default` and asks it for its
/// descriptor. Handlers that need controller state capture clones of the
/// `Arc`.
pub trait Controller: Send + Sync + 'static {
    fn describe(self: Arc<Self>) -> ControllerDescriptor;
}
