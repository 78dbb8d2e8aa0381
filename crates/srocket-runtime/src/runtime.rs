//! The SRocket server facade.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use srocket_runtime::SRocket;
//!
//! // Defaults with an explicit port
//! let server = SRocket::from_port(3000).controller::<UserController>();
//! server.run().await?;
//!
//! // Loaded from srocket.toml / SROCKET_* variables
//! let server = SRocket::builder()
//!     .profile("production")
//!     .build()?
//!     .controller::<UserController>();
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use srocket_core::{ListenerHandle, SRequest, SResponse, ServerRef, ServerTransport};
use srocket_framework::{
    BoxedMiddleware, Controller, ControllerDescriptor, Middleware, RouteMetadataStore, Router,
    UnhandledHook,
};
use srocket_transport::WsServerTransport;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, SRocketConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// An event server built from controllers.
///
/// Controllers, global middleware and the unhandled-event hook are collected
/// up front; [`SRocket::listen`] turns them into a route index and binds the
/// WebSocket transport.
pub struct SRocket {
    config: SRocketConfig,
    descriptors: Vec<ControllerDescriptor>,
    global_before: Vec<BoxedMiddleware>,
    global_after: Vec<BoxedMiddleware>,
    unhandled: Option<UnhandledHook>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl SRocket {
    /// Creates a builder that loads configuration from files and environment.
    pub fn builder() -> SRocketBuilder {
        SRocketBuilder::new()
    }

    /// Creates a server with default settings on `port`.
    pub fn from_port(port: u16) -> Self {
        let mut config = SRocketConfig::default();
        config.server.port = port;
        Self::from_config(config)
    }

    /// Creates a server from configuration.
    ///
    /// Logging is initialised from `config.logging` unless a subscriber is
    /// already installed.
    pub fn from_config(config: SRocketConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            port = config.server.port,
            path = %config.server.path,
            log_level = %config.logging.level,
            "Server initialized from configuration"
        );

        Self {
            config,
            descriptors: Vec::new(),
            global_before: Vec::new(),
            global_after: Vec::new(),
            unhandled: None,
            listener: Mutex::new(None),
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &SRocketConfig {
        &self.config
    }

    /// Registers controller `C`, instantiated once.
    pub fn controller<C: Controller + Default>(self) -> Self {
        self.controller_instance(Arc::new(C::default()))
    }

    /// Registers an existing controller instance.
    pub fn controller_instance<C: Controller>(self, controller: Arc<C>) -> Self {
        self.descriptor(controller.describe())
    }

    /// Registers an already built descriptor.
    pub fn descriptor(mut self, descriptor: ControllerDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Adds middleware applied to every route.
    ///
    /// `before` runs ahead of controller middleware; `after` runs once every
    /// route-level after-middleware finished.
    pub fn global_middleware(
        mut self,
        before: impl IntoIterator<Item = BoxedMiddleware>,
        after: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> Self {
        self.global_before.extend(before);
        self.global_after.extend(after);
        self
    }

    /// Appends one global before-middleware.
    pub fn before(mut self, middleware: impl Middleware) -> Self {
        self.global_before.push(Arc::new(middleware));
        self
    }

    /// Appends one global after-middleware.
    pub fn after(mut self, middleware: impl Middleware) -> Self {
        self.global_after.push(Arc::new(middleware));
        self
    }

    /// Installs the observer for events no route answers to.
    pub fn on_unhandled<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(SRequest, SResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.unhandled = Some(Arc::new(move |req, res| Box::pin(hook(req, res))));
        self
    }

    /// Number of registered controllers.
    pub fn controller_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Builds the route index from every registered controller.
    fn build_router(&self) -> RuntimeResult<Router> {
        let mut store = RouteMetadataStore::new();
        for descriptor in &self.descriptors {
            store.build_descriptor(descriptor.clone())?;
        }

        let mut router = Router::new()
            .global_middleware(self.global_before.clone(), self.global_after.clone())
            .register_routes(&store);
        if let Some(hook) = &self.unhandled {
            router = router.unhandled_hook(Arc::clone(hook));
        }

        info!(
            controllers = store.controllers().len(),
            routes = router.route_count(),
            "Routes registered"
        );
        Ok(router)
    }

    /// Binds the transport and starts accepting connections.
    ///
    /// Returns the bound address.
    pub async fn listen(&self) -> RuntimeResult<SocketAddr> {
        let mut listener = self.listener.lock().await;
        if let Some(handle) = listener.as_ref() {
            return Err(RuntimeError::AlreadyListening(handle.local_addr));
        }

        validate_config(&self.config)?;
        let router = self.build_router()?;

        let transport = WsServerTransport::new(self.config.server.path.clone())
            .with_channel_capacity(self.config.server.channel_capacity);
        let handle = transport
            .listen(&self.config.server.bind_addr(), Arc::new(router))
            .await?;

        let addr = handle.local_addr;
        *listener = Some(handle);
        info!(addr = %addr, path = %self.config.server.path, "SRocket server listening");
        Ok(addr)
    }

    /// Like [`SRocket::listen`], invoking `callback` with the bound address.
    pub async fn listen_with<F>(&self, callback: F) -> RuntimeResult<SocketAddr>
    where
        F: FnOnce(SocketAddr),
    {
        let addr = self.listen().await?;
        callback(addr);
        Ok(addr)
    }

    /// Closes every connection and releases the listener.
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        let handle = self
            .listener
            .lock()
            .await
            .take()
            .ok_or(RuntimeError::NotListening)?;

        info!(addr = %handle.local_addr, "Shutting down SRocket server");
        handle.stop();
        Ok(())
    }

    /// Returns whether the server is currently listening.
    pub async fn is_listening(&self) -> bool {
        self.listener.lock().await.is_some()
    }

    /// The bound address, while listening.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.as_ref().map(|h| h.local_addr)
    }

    /// The transport server, for emitting outside of a dispatch.
    pub async fn server(&self) -> Option<ServerRef> {
        self.listener.lock().await.as_ref().map(|h| h.server())
    }

    /// Listens until a shutdown signal is received.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Listens until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.listen().await?;
        info!(addr = %addr, "SRocket server is now running. Press Ctrl+C to stop.");

        shutdown.await;

        self.shutdown().await
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

// =============================================================================
// SRocketBuilder
// =============================================================================

/// Builder for an [`SRocket`] whose configuration is loaded from files and
/// environment.
///
/// # Example
///
/// ```rust,ignore
/// let server = SRocket::builder()
///     .config_file("config/srocket.toml")
///     .set("server.port", 8080)
///     .build()?;
/// ```
pub struct SRocketBuilder {
    config_loader: ConfigLoader,
}

impl SRocketBuilder {
    /// Creates a new builder searching the current directory.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Overrides one dotted configuration key.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Loads the configuration and builds the server.
    pub fn build(self) -> ConfigResult<SRocket> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        Ok(SRocket::from_config(config))
    }
}

impl Default for SRocketBuilder {
    fn default() -> Self {
        Self::new()
    }
}
