//! Composition root for the HTTP route runner
//!
//! Registries are owned here and handed to the runner by `Arc`, never held
//! as ambient globals: register once at startup, read many times while
//! serving.

use std::sync::Arc;

use junction_core::{
    ErrorKind, ErrorRegistry, NoServices, NoServicesFactory, SessionServices,
    SessionServicesFactory,
};
use junction_schema::SchemaRegistry;
use serde_json::Value;

use crate::registry::RouteRegistry;
use crate::route::{Route, RouteMeta};
use crate::runner::{RouteRunner, RunnerOptions};
use crate::session_resolver::SessionResolver;

/// Builder assembling registries, resolver, and options into a runner
pub struct RouterBuilder<S, P>
where
    S: Send + Sync,
    P: SessionServices,
{
    registry: RouteRegistry<S, P>,
    schemas: SchemaRegistry,
    errors: ErrorRegistry,
    resolver: SessionResolver,
    options: RunnerOptions,
    singleton: Arc<S>,
    factory: Arc<dyn SessionServicesFactory<Singleton = S, Services = P>>,
}

impl<S> RouterBuilder<S, NoServices>
where
    S: Send + Sync + 'static,
{
    /// Builder for applications without per-request services
    pub fn without_session_services(singleton: S) -> Self {
        Self::new(singleton, Arc::new(NoServicesFactory::new()))
    }
}

impl<S, P> RouterBuilder<S, P>
where
    S: Send + Sync,
    P: SessionServices,
{
    pub fn new(
        singleton: S,
        factory: Arc<dyn SessionServicesFactory<Singleton = S, Services = P>>,
    ) -> Self {
        Self {
            registry: RouteRegistry::new(),
            schemas: SchemaRegistry::new(),
            errors: ErrorRegistry::new(),
            resolver: SessionResolver::new(),
            options: RunnerOptions::default(),
            singleton: Arc::new(singleton),
            factory,
        }
    }

    pub fn route(self, route: Route<S, P>) -> Self {
        self.registry.register(route);
        self
    }

    pub fn meta(self, meta: RouteMeta) -> Self {
        self.registry.register_meta(meta);
        self
    }

    pub fn schema(self, name: impl Into<String>, schema: Value) -> Self {
        self.schemas.register(name, schema);
        self
    }

    /// Register or override an error kind's wire response
    pub fn error_kind(mut self, kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        self.errors.register(kind, status, message);
        self
    }

    pub fn resolver(mut self, resolver: SessionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn respond_with_404(mut self, enable: bool) -> Self {
        self.options.respond_with_404 = enable;
        self
    }

    /// Add a status to the log-as-warning allowlist
    pub fn warn_on_status(mut self, status: u16) -> Self {
        self.options.warn_statuses.insert(status);
        self
    }

    pub fn build(self) -> RouteRunner<S, P> {
        RouteRunner::new(
            Arc::new(self.registry),
            Arc::new(self.schemas),
            Arc::new(self.errors),
            Arc::new(self.resolver),
            self.singleton,
            self.factory,
            self.options,
        )
    }
}
