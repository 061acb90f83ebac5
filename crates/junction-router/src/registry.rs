//! Route registry and matcher
//!
//! Routes are registered once at startup and read for the process lifetime;
//! `clear` exists for test teardown only and must not run concurrently with
//! live traffic. Matching is first-match-wins in registration order, a
//! documented policy rather than a bug: when two patterns could both match,
//! registration order decides.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use junction_core::HttpMethod;

use crate::route::{Route, RouteMeta};

/// The outcome of a successful match
pub struct RouteMatch<S, P> {
    pub route: Arc<Route<S, P>>,
    pub params: HashMap<String, String>,
    /// Schema to validate against, resolved from the route or its metadata
    pub schema_name: Option<String>,
}

/// Registry of routes plus their generated metadata
///
/// No uniqueness check is enforced at registration time; duplicate
/// detection is a static-analysis concern for the tooling that emits
/// metadata.
pub struct RouteRegistry<S, P> {
    routes: RwLock<Vec<Arc<Route<S, P>>>>,
    meta: RwLock<HashMap<(HttpMethod, String), RouteMeta>>,
}

impl<S, P> RouteRegistry<S, P> {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            meta: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, route: Route<S, P>) {
        self.routes.write().push(Arc::new(route));
    }

    /// Attach generated metadata for the exact (method, route) pair
    pub fn register_meta(&self, meta: RouteMeta) {
        self.meta
            .write()
            .insert((meta.method, meta.route.clone()), meta);
    }

    /// Test-only reset of routes and metadata
    pub fn clear(&self) {
        self.routes.write().clear();
        self.meta.write().clear();
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    pub fn all(&self) -> Vec<Arc<Route<S, P>>> {
        self.routes.read().clone()
    }

    /// Match a (method, path) pair against registered routes
    ///
    /// Routes whose method differs are skipped; the first pattern match in
    /// registration order wins. The schema name comes from the route's
    /// explicit configuration, falling back to registered metadata.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<RouteMatch<S, P>> {
        let routes = self.routes.read();
        for route in routes.iter() {
            if route.method() != method {
                continue;
            }
            if let Some(params) = route.pattern().matches(path) {
                let schema_name = route.schema_name().map(str::to_string).or_else(|| {
                    self.meta
                        .read()
                        .get(&(method, route.pattern().as_str().to_string()))
                        .and_then(|meta| meta.schema_name.clone())
                });
                return Some(RouteMatch {
                    route: Arc::clone(route),
                    params,
                    schema_name,
                });
            }
        }
        None
    }
}

impl<S, P> Default for RouteRegistry<S, P> {
    fn default() -> Self {
        Self::new()
    }
}
