//! In-memory request/response doubles
//!
//! Useful for development and testing without a live transport, mirroring
//! the abstract contract exactly: the response records every write so
//! assertions can inspect what a runner produced.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::http::{CookieOptions, HttpMethod, HttpRequest, HttpResponse, ResponseBody};

/// Builder-style in-memory request
#[derive(Debug, Clone)]
pub struct InMemoryRequest {
    method: HttpMethod,
    path: String,
    params: HashMap<String, String>,
    query: Map<String, Value>,
    body: Option<Value>,
    raw_body: Option<Vec<u8>>,
    headers: HashMap<String, String>,
    fail_body: bool,
}

impl InMemoryRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: HashMap::new(),
            query: Map::new(),
            body: None,
            raw_body: None,
            headers: HashMap::new(),
            fail_body: false,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: Value) -> Self {
        self.query.insert(key.into(), value);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.raw_body = Some(body.to_string().into_bytes());
        self.body = Some(body);
        self
    }

    /// Header names are stored lowercased, matching real transports
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Append a cookie pair to the `cookie` header
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        let pair = format!("{}={}", name, value);
        let header = match self.headers.get("cookie") {
            Some(existing) => format!("{}; {}", existing, pair),
            None => pair,
        };
        self.headers.insert("cookie".to_string(), header);
        self
    }

    /// Make `body()` fail, for exercising transport read errors
    pub fn with_unreadable_body(mut self) -> Self {
        self.fail_body = true;
        self
    }
}

impl HttpRequest for InMemoryRequest {
    fn method(&self) -> HttpMethod {
        self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    fn query(&self) -> Map<String, Value> {
        self.query.clone()
    }

    fn body(&self) -> ApiResult<Option<Value>> {
        if self.fail_body {
            return Err(ApiError::bad_request("failed to read request body"));
        }
        Ok(self.body.clone())
    }

    fn raw_body(&self) -> Option<&[u8]> {
        self.raw_body.as_deref()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_ascii_lowercase()).cloned()
    }
}

/// Response double capturing every write
#[derive(Debug, Default)]
pub struct InMemoryResponse {
    pub status: Option<u16>,
    pub json: Option<Value>,
    pub body: Option<ResponseBody>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String, CookieOptions)>,
    pub cleared_cookies: Vec<String>,
    pub redirect: Option<(String, u16)>,
    pub ended: bool,
}

impl InMemoryResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON body written so far, or `Value::Null`
    pub fn json_body(&self) -> Value {
        self.json.clone().unwrap_or(Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl HttpResponse for InMemoryResponse {
    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn set_json(&mut self, value: Value) {
        self.json = Some(value);
    }

    fn set_response(&mut self, body: ResponseBody) {
        self.body = Some(body);
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn set_cookie(&mut self, name: &str, value: &str, options: &CookieOptions) {
        self.cookies
            .push((name.to_string(), value.to_string(), options.clone()));
    }

    fn clear_cookie(&mut self, name: &str) {
        self.cleared_cookies.push(name.to_string());
    }

    fn set_redirect(&mut self, location: &str, status: u16) {
        self.redirect = Some((location.to_string(), status));
    }

    fn end(&mut self) {
        self.ended = true;
    }
}
