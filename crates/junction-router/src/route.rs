//! Route descriptors and handler traits
//!
//! A [`Route`] binds an (HTTP method, path pattern) pair to a handler plus
//! its auth/permission/schema configuration. Routes are generic over the
//! application's singleton service bundle `S` and session-service bundle `P`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use junction_core::{ApiResult, HttpMethod, ServiceScope, UserSession};

use crate::pattern::PathPattern;
use crate::permissions::{PermissionCheck, PermissionGroups};

/// Handler invoked once the pipeline has matched, authenticated, validated,
/// and authorized a request
///
/// `session` is `None` only on routes registered with auth disabled.
#[async_trait]
pub trait RouteHandler<S, P>: Send + Sync {
    async fn call(
        &self,
        services: &mut ServiceScope<'_, S, P>,
        data: Value,
        session: Option<&UserSession>,
    ) -> ApiResult<Value>;
}

/// Registered route descriptor
pub struct Route<S, P> {
    method: HttpMethod,
    pattern: PathPattern,
    handler: Arc<dyn RouteHandler<S, P>>,
    auth: bool,
    permissions: PermissionGroups<S, P>,
    schema_name: Option<String>,
    returns_json: bool,
    query: Vec<String>,
}

impl<S, P> Route<S, P> {
    /// Create a route; auth defaults to required, output to JSON
    pub fn new(
        method: HttpMethod,
        pattern: &str,
        handler: impl RouteHandler<S, P> + 'static,
    ) -> ApiResult<Self> {
        Ok(Self {
            method,
            pattern: PathPattern::new(pattern)?,
            handler: Arc::new(handler),
            auth: true,
            permissions: PermissionGroups::new(),
            schema_name: None,
            returns_json: true,
            query: Vec::new(),
        })
    }

    pub fn with_auth(mut self, auth: bool) -> Self {
        self.auth = auth;
        self
    }

    /// Add a named permission group (AND within the group, OR across groups)
    pub fn with_permission_group(
        mut self,
        name: impl Into<String>,
        checks: Vec<Arc<dyn PermissionCheck<S, P>>>,
    ) -> Self {
        self.permissions.add_group(name, checks);
        self
    }

    /// Explicit schema name, overriding any metadata lookup
    pub fn with_schema(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    /// Write the handler's return value raw instead of JSON-encoding it
    pub fn returns_raw(mut self) -> Self {
        self.returns_json = false;
        self
    }

    /// Declared query-param allowlist, consulted for body-carrying methods
    pub fn with_query(mut self, params: &[&str]) -> Self {
        self.query = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn requires_session(&self) -> bool {
        self.auth
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    pub fn returns_json(&self) -> bool {
        self.returns_json
    }

    pub fn query_allowlist(&self) -> &[String] {
        &self.query
    }

    pub fn permissions(&self) -> &PermissionGroups<S, P> {
        &self.permissions
    }

    pub fn handler(&self) -> &Arc<dyn RouteHandler<S, P>> {
        &self.handler
    }
}

/// Generated route metadata, produced by external tooling and consumed
/// read-only by the matcher to resolve schema names without re-deriving them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    pub method: HttpMethod,
    pub route: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub query: Vec<String>,
    #[serde(default)]
    pub schema_name: Option<String>,
    /// Advisory compute budget in milliseconds for the surrounding host
    /// (e.g. a serverless cutoff); never enforced by the runner
    #[serde(default)]
    pub maximum_compute_time: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::NoServices;

    struct Echo;

    #[async_trait]
    impl RouteHandler<(), NoServices> for Echo {
        async fn call(
            &self,
            _services: &mut ServiceScope<'_, (), NoServices>,
            data: Value,
            _session: Option<&UserSession>,
        ) -> ApiResult<Value> {
            Ok(data)
        }
    }

    #[test]
    fn test_route_defaults() {
        let route: Route<(), NoServices> =
            Route::new(HttpMethod::Get, "/v1/widgets/:id", Echo).unwrap();
        assert!(route.requires_session());
        assert!(route.returns_json());
        assert!(route.schema_name().is_none());
        assert!(route.permissions().is_empty());
    }

    #[test]
    fn test_route_builder() {
        let route: Route<(), NoServices> = Route::new(HttpMethod::Post, "/v1/widgets", Echo)
            .unwrap()
            .with_auth(false)
            .with_schema("CreateWidget")
            .with_query(&["dryRun"])
            .returns_raw();
        assert!(!route.requires_session());
        assert_eq!(route.schema_name(), Some("CreateWidget"));
        assert_eq!(route.query_allowlist(), &["dryRun".to_string()]);
        assert!(!route.returns_json());
    }

    #[test]
    fn test_meta_deserializes_with_defaults() {
        let meta: RouteMeta = serde_json::from_str(
            r#"{"method": "GET", "route": "/v1/widgets/:id", "schemaName": "Widget"}"#,
        )
        .unwrap();
        assert_eq!(meta.method, HttpMethod::Get);
        assert_eq!(meta.schema_name.as_deref(), Some("Widget"));
        assert!(meta.params.is_empty());
    }
}
