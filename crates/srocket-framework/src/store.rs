//! Route metadata store.
//!
//! The store turns controller descriptors into registered routes. Each
//! member marked as a route is classified once, wrapped in an
//! [`InternalRoute`] and kept with its resolved [`RouteConfig`]. The result is
//! read-only once the router has indexed it.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use srocket_core::ROOT_NAMESPACE;
use tracing::info;

use crate::config::{ControllerConfig, RouteConfig};
use crate::controller::{Controller, ControllerDescriptor, MemberDescriptor, MemberValue};
use crate::error::{RegistrationError, RegistrationResult};
use crate::handler::{ClassRoute, InternalRoute, LifecycleRoute, RouteType};

/// A registered route.
#[derive(Clone)]
pub struct RouteMetadata {
    pub handler: Arc<InternalRoute>,
    pub config: Arc<RouteConfig>,
}

impl RouteMetadata {
    pub fn new(handler: InternalRoute, config: RouteConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            config: Arc::new(config),
        }
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    pub fn route_type(&self) -> RouteType {
        self.handler.route_type()
    }
}

impl fmt::Debug for RouteMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMetadata")
            .field("path", &self.config.path)
            .field("route_type", &self.route_type())
            .finish()
    }
}

/// A registered controller.
#[derive(Clone)]
pub struct ControllerMetadata {
    pub name: String,
    pub namespace: String,
    pub message_routes: Vec<RouteMetadata>,
    pub connect_handlers: Vec<LifecycleRoute>,
    pub disconnect_handlers: Vec<LifecycleRoute>,
    pub config: Arc<ControllerConfig>,
}

impl ControllerMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: ROOT_NAMESPACE.to_string(),
            message_routes: Vec::new(),
            connect_handlers: Vec::new(),
            disconnect_handlers: Vec::new(),
            config: Arc::new(ControllerConfig::default()),
        }
    }
}

impl fmt::Debug for ControllerMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerMetadata")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("message_routes", &self.message_routes)
            .field("connect_handlers", &self.connect_handlers.len())
            .field("disconnect_handlers", &self.disconnect_handlers.len())
            .finish()
    }
}

/// Registry of every controller and its routes.
#[derive(Debug, Clone, Default)]
pub struct RouteMetadataStore {
    controllers: Vec<ControllerMetadata>,
}

impl RouteMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates `C` once and registers its descriptor.
    pub fn build_controller<C: Controller + Default>(&mut self) -> RegistrationResult<()> {
        self.build_controller_instance(Arc::new(C::default()))
    }

    /// Registers an existing controller instance.
    pub fn build_controller_instance<C: Controller>(
        &mut self,
        controller: Arc<C>,
    ) -> RegistrationResult<()> {
        self.build_descriptor(controller.describe())
    }

    /// Registers a controller from its descriptor.
    ///
    /// Nothing is added when any member fails to register.
    pub fn build_descriptor(&mut self, descriptor: ControllerDescriptor) -> RegistrationResult<()> {
        info!(controller = %descriptor.name, "Registering controller");

        let ControllerDescriptor {
            name,
            namespace,
            middleware,
            members,
            on_connect,
            on_disconnect,
        } = descriptor;

        let mut metadata = ControllerMetadata::new(name);
        if let Some(namespace) = namespace.filter(|ns| !ns.is_empty()) {
            // Connections report namespaces with a leading slash.
            metadata.namespace = if namespace.starts_with('/') {
                namespace
            } else {
                format!("/{namespace}")
            };
        }
        metadata.config = Arc::new(ControllerConfig { middleware });

        let mut seen = HashSet::new();
        for member in members.into_iter().filter(MemberDescriptor::is_route) {
            let path = Self::build_route(&mut metadata, member)?;
            if !seen.insert(path.clone()) {
                return Err(RegistrationError::DuplicatePath {
                    controller: metadata.name,
                    path,
                });
            }
        }

        for handler in on_connect {
            info!(controller = %metadata.name, "Registered connect handler");
            metadata.connect_handlers.push(handler);
        }
        for handler in on_disconnect {
            info!(controller = %metadata.name, "Registered disconnect handler");
            metadata.disconnect_handlers.push(handler);
        }

        self.controllers.push(metadata);
        Ok(())
    }

    /// Classifies one member and appends it to `metadata` as a route.
    ///
    /// Returns the resolved path.
    pub fn build_route(
        metadata: &mut ControllerMetadata,
        member: MemberDescriptor,
    ) -> RegistrationResult<String> {
        let MemberDescriptor { name, value, route } = member;
        let config = route.unwrap_or_default().resolve(&name);

        if config.path.is_empty() {
            return Err(RegistrationError::EmptyPath {
                controller: metadata.name.clone(),
                member: name,
            });
        }

        let route_type =
            Self::find_route_type(&value).ok_or_else(|| RegistrationError::RouteTypeError {
                controller: metadata.name.clone(),
                member: name.clone(),
            })?;

        let handler = match value {
            MemberValue::Function(route) => InternalRoute::Function(route),
            MemberValue::Object(route) => InternalRoute::Object(route),
            MemberValue::Class(factory) => InternalRoute::Class(ClassRoute::instantiate(&factory)),
            MemberValue::Data(_) => {
                return Err(RegistrationError::RouteTypeError {
                    controller: metadata.name.clone(),
                    member: name,
                });
            }
        };

        info!(
            controller = %metadata.name,
            route_type = %route_type,
            convention = ?handler.convention(),
            path = %config.path,
            "Registered route"
        );

        let path = config.path.clone();
        metadata
            .message_routes
            .push(RouteMetadata::new(handler, config));
        Ok(path)
    }

    /// Classifies a member value, or `None` if it has no handler shape.
    pub fn find_route_type(value: &MemberValue) -> Option<RouteType> {
        match value {
            MemberValue::Function(_) => Some(RouteType::Function),
            MemberValue::Object(_) => Some(RouteType::Object),
            MemberValue::Class(_) => Some(RouteType::Class),
            MemberValue::Data(_) => None,
        }
    }

    /// Every registered controller, in registration order.
    pub fn controllers(&self) -> &[ControllerMetadata] {
        &self.controllers
    }

    /// Total number of routes across all controllers.
    pub fn route_count(&self) -> usize {
        self.controllers
            .iter()
            .map(|c| c.message_routes.len())
            .sum()
    }
}
