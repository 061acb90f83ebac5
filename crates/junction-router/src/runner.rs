//! HTTP route runner
//!
//! One linear state machine per request, no backtracking:
//! match → params → session → aggregate → validate → compose services →
//! authorize → invoke → respond, with unconditional session-service teardown
//! and a single top-level error mapping step. The mapped error is still
//! returned to the caller after the response is finalized, so transport
//! adapters decide whether to additionally log or ignore it.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use junction_core::{
    ApiError, ApiResult, ErrorKind, ErrorRegistry, HttpRequest, HttpResponse, Interaction,
    ResponseBody, ServiceScope, SessionServices, SessionServicesFactory,
};
use junction_schema::SchemaRegistry;

use crate::registry::{RouteMatch, RouteRegistry};
use crate::route::Route;
use crate::session_resolver::SessionResolver;

/// Runner-wide configuration
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Finalize a 404 response for unmatched routes; when disabled the
    /// response is left untouched and only the error is raised
    pub respond_with_404: bool,
    /// Statuses logged at warning level when a mapped error is returned;
    /// everything else stays quiet to avoid noise for expected 4xx traffic
    pub warn_statuses: HashSet<u16>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            respond_with_404: true,
            warn_statuses: HashSet::new(),
        }
    }
}

/// Per-invocation options
#[derive(Debug, Clone, Default)]
pub struct RunRouteOptions {
    /// Skip session resolution entirely; only legal on routes registered
    /// with auth disabled
    pub skip_user_session: bool,
}

/// Orchestrates the request pipeline against a route registry
pub struct RouteRunner<S, P>
where
    S: Send + Sync,
    P: SessionServices,
{
    registry: Arc<RouteRegistry<S, P>>,
    schemas: Arc<SchemaRegistry>,
    errors: Arc<ErrorRegistry>,
    resolver: Arc<SessionResolver>,
    singleton: Arc<S>,
    factory: Arc<dyn SessionServicesFactory<Singleton = S, Services = P>>,
    options: RunnerOptions,
}

impl<S, P> RouteRunner<S, P>
where
    S: Send + Sync,
    P: SessionServices,
{
    pub fn new(
        registry: Arc<RouteRegistry<S, P>>,
        schemas: Arc<SchemaRegistry>,
        errors: Arc<ErrorRegistry>,
        resolver: Arc<SessionResolver>,
        singleton: Arc<S>,
        factory: Arc<dyn SessionServicesFactory<Singleton = S, Services = P>>,
        options: RunnerOptions,
    ) -> Self {
        Self {
            registry,
            schemas,
            errors,
            resolver,
            singleton,
            factory,
            options,
        }
    }

    pub fn registry(&self) -> &Arc<RouteRegistry<S, P>> {
        &self.registry
    }

    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    pub fn errors(&self) -> &Arc<ErrorRegistry> {
        &self.errors
    }

    /// Run a request through the pipeline with default options
    pub async fn run(
        &self,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
    ) -> ApiResult<Value> {
        self.run_with_options(request, response, RunRouteOptions::default())
            .await
    }

    /// Run a request through the pipeline
    ///
    /// On success the response is finalized with status 200 and the
    /// handler's output; the output is also returned. On failure the
    /// response is finalized from the error registry and the error is
    /// returned as well.
    pub async fn run_with_options(
        &self,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        options: RunRouteOptions,
    ) -> ApiResult<Value> {
        match self.execute(request, response, &options).await {
            Ok(value) => Ok(value),
            Err(err) => Err(self.finalize_error(err, response)),
        }
    }

    async fn execute(
        &self,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        options: &RunRouteOptions,
    ) -> ApiResult<Value> {
        // 1. match
        let method = request.method();
        let matched = self
            .registry
            .find(method, request.path())
            .ok_or_else(|| ApiError::route_not_found(request.path()))?;
        debug!(
            method = %method,
            path = request.path(),
            pattern = matched.route.pattern().as_str(),
            "matched route"
        );

        // resolving a schema at match time also triggers its (idempotent)
        // compilation, so a broken schema fails before any work is done
        if let Some(name) = matched.schema_name.as_deref() {
            self.schemas.load(name)?;
        }

        // 2. params land on the request before any aggregation runs
        request.set_params(matched.params.clone());

        // 3. session
        let requires_session = matched.route.requires_session();
        if options.skip_user_session && requires_session {
            return Err(ApiError::internal(
                "skip_user_session requires a route registered with auth disabled",
            ));
        }
        let session = if options.skip_user_session {
            None
        } else {
            match self.resolver.resolve(&*request, requires_session).await {
                Ok(session) => session,
                // an absent credential is tolerated on optional-auth routes;
                // a presented-but-invalid one still surfaces
                Err(err) if !requires_session && err.kind == ErrorKind::MissingSession => None,
                Err(err) => return Err(err),
            }
        };

        // 4. aggregate
        let mut data = aggregate_data(&*request, &matched.route)?;

        // 5. validate, using the schema resolved at match time; coercion is
        // for query-string-shaped data, so it only applies to bodyless
        // methods
        let coerce = !method.has_body();
        self.schemas
            .validate_and_coerce(matched.schema_name.as_deref(), &mut data, coerce)?;

        // 6. compose services only after validation succeeded
        let interaction = Interaction::with_request(&*request);
        let mut session_services = self
            .factory
            .create(self.singleton.as_ref(), interaction, session.as_ref())
            .await?;

        // 7-8. authorize + invoke under the teardown guard
        let outcome = self
            .authorize_and_invoke(&matched, &mut session_services, data, session.as_ref())
            .await;
        self.teardown(&mut session_services).await;
        let value = outcome?;

        // 9. respond
        if matched.route.returns_json() {
            response.set_json(value.clone());
        } else {
            response.set_response(raw_body(&value));
        }
        response.set_status(200);
        response.end();
        Ok(value)
    }

    async fn authorize_and_invoke(
        &self,
        matched: &RouteMatch<S, P>,
        session_services: &mut P,
        data: Value,
        session: Option<&junction_core::UserSession>,
    ) -> ApiResult<Value> {
        let mut scope = ServiceScope {
            singleton: self.singleton.as_ref(),
            session: session_services,
        };
        if !matched.route.permissions().is_empty() {
            let granted = matched
                .route
                .permissions()
                .verify(&scope, &data, session)
                .await?;
            if !granted {
                return Err(ApiError::forbidden());
            }
        }
        matched.route.handler().call(&mut scope, data, session).await
    }

    /// Close every service opting into teardown; failures are logged and
    /// suppressed so they never mask the primary outcome
    async fn teardown(&self, services: &mut P) {
        for closable in services.closables() {
            if let Err(err) = closable.close().await {
                warn!("session service teardown failed: {}", err);
            }
        }
    }

    /// Map an error onto the response and hand it back to the caller
    fn finalize_error(&self, mut err: ApiError, response: &mut dyn HttpResponse) -> ApiError {
        if err.kind == ErrorKind::RouteNotFound && !self.options.respond_with_404 {
            return err;
        }
        err.ensure_trace_id();
        let (status, body, mapped) = self.errors.render(&err);
        let trace_id = body.trace_id.clone().unwrap_or_default();
        if mapped {
            if self.options.warn_statuses.contains(&status) {
                warn!(status, trace_id = trace_id.as_str(), "request failed: {}", err);
            }
        } else {
            error!(status, trace_id = trace_id.as_str(), "unmapped error: {}", err);
        }
        response.set_status(status);
        response.set_json(serde_json::to_value(&body).unwrap_or(Value::Null));
        response.end();
        err
    }
}

/// Aggregate the request's combined data view for a matched route
///
/// Params first, then query, then body; earlier sources are never
/// overwritten. For body-carrying methods only query params on the route's
/// declared allowlist participate.
fn aggregate_data<S, P>(request: &dyn HttpRequest, route: &Route<S, P>) -> ApiResult<Value> {
    let mut merged = Map::new();
    for (key, value) in request.params() {
        merged.insert(key.clone(), Value::String(value.clone()));
    }
    let allow_all_query = !route.method().has_body();
    for (key, value) in request.query() {
        if !allow_all_query && !route.query_allowlist().iter().any(|q| q == &key) {
            continue;
        }
        merged.entry(key).or_insert(value);
    }
    match request.body()? {
        Some(Value::Object(body)) => {
            for (key, value) in body {
                merged.entry(key).or_insert(value);
            }
        }
        Some(other) if merged.is_empty() => return Ok(other),
        _ => {}
    }
    Ok(Value::Object(merged))
}

fn raw_body(value: &Value) -> ResponseBody {
    match value {
        Value::String(text) => ResponseBody::Text(text.clone()),
        other => ResponseBody::Text(other.to_string()),
    }
}
