//! Session resolution strategies
//!
//! A request's credentials are inspected in a fixed precedence order:
//! bearer token, API-key header, named cookies, then a query parameter. The
//! first strategy to yield a session wins; claims are never merged across
//! strategies, so independently-sourced credentials cannot compose into
//! accidental privilege escalation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use junction_core::{ApiError, ApiResult, HttpRequest, UserSession};

/// Decodes a bearer token into session claims
#[async_trait]
pub trait TokenDecoder: Send + Sync {
    async fn decode(&self, token: &str) -> ApiResult<UserSession>;
}

/// Resolves an API key to a session
#[async_trait]
pub trait ApiKeyLookup: Send + Sync {
    async fn session_for_key(&self, key: &str) -> ApiResult<Option<UserSession>>;
}

/// Resolves a named cookie's value to a session
#[async_trait]
pub trait CookieSessionLookup: Send + Sync {
    async fn session_for_cookie(&self, name: &str, value: &str) -> ApiResult<Option<UserSession>>;
}

/// Resolves a query-parameter credential to a session
#[async_trait]
pub trait QuerySessionLookup: Send + Sync {
    async fn session_for_query(&self, value: &str) -> ApiResult<Option<UserSession>>;
}

/// Hook run once over the resolved raw session before it is returned
#[async_trait]
pub trait SessionTransform: Send + Sync {
    async fn transform(&self, session: UserSession) -> ApiResult<UserSession>;
}

/// Configurable session resolver
#[derive(Default)]
pub struct SessionResolver {
    bearer: Option<Arc<dyn TokenDecoder>>,
    api_key: Option<(String, Arc<dyn ApiKeyLookup>)>,
    cookies: Vec<(String, Arc<dyn CookieSessionLookup>)>,
    query: Option<(String, Arc<dyn QuerySessionLookup>)>,
    transform: Option<Arc<dyn SessionTransform>>,
}

impl SessionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bearer(mut self, decoder: Arc<dyn TokenDecoder>) -> Self {
        self.bearer = Some(decoder);
        self
    }

    pub fn with_api_key(
        mut self,
        header: impl Into<String>,
        lookup: Arc<dyn ApiKeyLookup>,
    ) -> Self {
        self.api_key = Some((header.into(), lookup));
        self
    }

    pub fn with_cookie(
        mut self,
        name: impl Into<String>,
        lookup: Arc<dyn CookieSessionLookup>,
    ) -> Self {
        self.cookies.push((name.into(), lookup));
        self
    }

    pub fn with_query(
        mut self,
        param: impl Into<String>,
        lookup: Arc<dyn QuerySessionLookup>,
    ) -> Self {
        self.query = Some((param.into(), lookup));
        self
    }

    pub fn with_transform(mut self, transform: Arc<dyn SessionTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn has_strategies(&self) -> bool {
        self.bearer.is_some()
            || self.api_key.is_some()
            || !self.cookies.is_empty()
            || self.query.is_some()
    }

    /// Resolve the request's session
    ///
    /// With no strategies configured at all, a required session is a
    /// `NotImplemented` error: the deployment is misconfigured, which must
    /// not read as a client error. With strategies configured but none
    /// yielding a session, a required session is `MissingSession`; an
    /// optional one resolves to `None`.
    pub async fn resolve(
        &self,
        request: &dyn HttpRequest,
        auth_required: bool,
    ) -> ApiResult<Option<UserSession>> {
        if !self.has_strategies() {
            if auth_required {
                return Err(ApiError::not_implemented(
                    "no session strategy is configured",
                ));
            }
            return Ok(None);
        }
        match self.resolve_raw(request).await? {
            Some(session) => {
                let session = match &self.transform {
                    Some(transform) => transform.transform(session).await?,
                    None => session,
                };
                Ok(Some(session))
            }
            None if auth_required => Err(ApiError::missing_session()),
            None => Ok(None),
        }
    }

    /// First-match-wins over bearer → API key → cookie → query
    async fn resolve_raw(&self, request: &dyn HttpRequest) -> ApiResult<Option<UserSession>> {
        if let Some(decoder) = &self.bearer {
            if let Some(header) = request.header("authorization") {
                let (scheme, token) = header.split_once(' ').ok_or_else(|| {
                    ApiError::invalid_session("malformed authorization header")
                })?;
                if !scheme.eq_ignore_ascii_case("bearer") {
                    return Err(ApiError::invalid_session(format!(
                        "unsupported authorization scheme '{}'",
                        scheme
                    )));
                }
                let session = decoder.decode(token.trim()).await?;
                debug!("session resolved from bearer token");
                return Ok(Some(session));
            }
        }
        if let Some((header_name, lookup)) = &self.api_key {
            if let Some(key) = request.header(header_name) {
                if let Some(session) = lookup.session_for_key(&key).await? {
                    debug!("session resolved from API key");
                    return Ok(Some(session));
                }
            }
        }
        if !self.cookies.is_empty() {
            let jar = request.cookies();
            for (name, lookup) in &self.cookies {
                if let Some(value) = jar.get(name) {
                    if let Some(session) = lookup.session_for_cookie(name, value).await? {
                        debug!(cookie = name.as_str(), "session resolved from cookie");
                        return Ok(Some(session));
                    }
                }
            }
        }
        if let Some((param, lookup)) = &self.query {
            let credential = request
                .query()
                .get(param)
                .and_then(|value| value.as_str().map(str::to_string));
            if let Some(value) = credential {
                if let Some(session) = lookup.session_for_query(&value).await? {
                    debug!(param = param.as_str(), "session resolved from query parameter");
                    return Ok(Some(session));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::testing::InMemoryRequest;
    use junction_core::{ErrorKind, HttpMethod};
    use serde_json::json;

    struct StaticDecoder;

    #[async_trait]
    impl TokenDecoder for StaticDecoder {
        async fn decode(&self, token: &str) -> ApiResult<UserSession> {
            if token == "good" {
                UserSession::from_value(json!({"sub": "bearer-user"}))
            } else {
                Err(ApiError::invalid_session("token rejected"))
            }
        }
    }

    struct KeyTable;

    #[async_trait]
    impl ApiKeyLookup for KeyTable {
        async fn session_for_key(&self, key: &str) -> ApiResult<Option<UserSession>> {
            if key == "k-1" {
                Ok(Some(UserSession::from_value(json!({"sub": "key-user"}))?))
            } else {
                Ok(None)
            }
        }
    }

    struct CookieTable;

    #[async_trait]
    impl CookieSessionLookup for CookieTable {
        async fn session_for_cookie(
            &self,
            _name: &str,
            value: &str,
        ) -> ApiResult<Option<UserSession>> {
            if value == "c-1" {
                Ok(Some(UserSession::from_value(json!({"sub": "cookie-user"}))?))
            } else {
                Ok(None)
            }
        }
    }

    fn full_resolver() -> SessionResolver {
        SessionResolver::new()
            .with_bearer(Arc::new(StaticDecoder))
            .with_api_key("x-api-key", Arc::new(KeyTable))
            .with_cookie("session", Arc::new(CookieTable))
    }

    #[tokio::test]
    async fn test_no_strategies_required_is_not_implemented() {
        let resolver = SessionResolver::new();
        let request = InMemoryRequest::new(HttpMethod::Get, "/");
        let err = resolver.resolve(&request, true).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotImplemented);
    }

    #[tokio::test]
    async fn test_no_credentials_required_is_missing_session() {
        let resolver = full_resolver();
        let request = InMemoryRequest::new(HttpMethod::Get, "/");
        let err = resolver.resolve(&request, true).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingSession);
    }

    #[tokio::test]
    async fn test_no_credentials_optional_is_none() {
        let resolver = full_resolver();
        let request = InMemoryRequest::new(HttpMethod::Get, "/");
        assert!(resolver.resolve(&request, false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bearer_wins_over_api_key_and_cookie() {
        let resolver = full_resolver();
        let request = InMemoryRequest::new(HttpMethod::Get, "/")
            .with_header("authorization", "Bearer good")
            .with_header("x-api-key", "k-1")
            .with_cookie("session", "c-1");
        let session = resolver.resolve(&request, true).await.unwrap().unwrap();
        assert_eq!(session.user_id(), Some("bearer-user"));
    }

    #[tokio::test]
    async fn test_api_key_wins_over_cookie() {
        let resolver = full_resolver();
        let request = InMemoryRequest::new(HttpMethod::Get, "/")
            .with_header("x-api-key", "k-1")
            .with_cookie("session", "c-1");
        let session = resolver.resolve(&request, true).await.unwrap().unwrap();
        assert_eq!(session.user_id(), Some("key-user"));
    }

    #[tokio::test]
    async fn test_cookie_resolution() {
        let resolver = full_resolver();
        let request =
            InMemoryRequest::new(HttpMethod::Get, "/").with_cookie("session", "c-1");
        let session = resolver.resolve(&request, true).await.unwrap().unwrap();
        assert_eq!(session.user_id(), Some("cookie-user"));
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_invalid_session() {
        let resolver = full_resolver();
        let request = InMemoryRequest::new(HttpMethod::Get, "/")
            .with_header("authorization", "Basic dXNlcjpwYXNz");
        let err = resolver.resolve(&request, true).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSession);
    }

    #[tokio::test]
    async fn test_invalid_token_surfaces_even_when_optional() {
        // a presented-but-rejected credential must not be swallowed by the
        // optional-auth path
        let resolver = full_resolver();
        let request = InMemoryRequest::new(HttpMethod::Get, "/")
            .with_header("authorization", "Bearer bad");
        let err = resolver.resolve(&request, false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSession);
    }

    struct Enricher;

    #[async_trait]
    impl SessionTransform for Enricher {
        async fn transform(&self, mut session: UserSession) -> ApiResult<UserSession> {
            session.set("enriched", json!(true));
            Ok(session)
        }
    }

    #[tokio::test]
    async fn test_transform_runs_once_over_resolved_session() {
        let resolver = full_resolver().with_transform(Arc::new(Enricher));
        let request = InMemoryRequest::new(HttpMethod::Get, "/")
            .with_header("authorization", "Bearer good");
        let session = resolver.resolve(&request, true).await.unwrap().unwrap();
        assert_eq!(session.get_bool("enriched"), Some(true));
    }
}
