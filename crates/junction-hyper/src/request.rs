//! Hyper-backed request binding

use std::collections::HashMap;
use std::str::FromStr;

use http_body_util::BodyExt;
use hyper::Request;
use hyper::body::Incoming;
use serde_json::{Map, Value};

use junction_core::{ApiError, ApiResult, ErrorKind, HttpMethod, HttpRequest};

/// A fully-read inbound request satisfying the core abstraction
pub struct HyperRequest {
    method: HttpMethod,
    path: String,
    query: Map<String, Value>,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
    params: HashMap<String, String>,
}

impl HyperRequest {
    /// Collect an incoming hyper request, enforcing the body-size cap
    pub async fn from_hyper(req: Request<Incoming>, max_body_size: usize) -> ApiResult<Self> {
        let method = HttpMethod::from_str(req.method().as_str())?;
        let path = req.uri().path().to_string();
        let query = parse_query(req.uri().query());
        let headers = req
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let collected = req
            .into_body()
            .collect()
            .await
            .map_err(|err| ApiError::bad_request(format!("failed to read request body: {}", err)))?
            .to_bytes();
        if collected.len() > max_body_size {
            return Err(ApiError::new(ErrorKind::PayloadTooLarge));
        }
        let body = if collected.is_empty() {
            None
        } else {
            Some(collected.to_vec())
        };

        Ok(Self {
            method,
            path,
            query,
            headers,
            body,
            params: HashMap::new(),
        })
    }
}

impl HttpRequest for HyperRequest {
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
        let Some(bytes) = &self.body else {
            return Ok(None);
        };
        let content_type = self.header("content-type").unwrap_or_default();
        if content_type.starts_with("application/json") {
            let value = serde_json::from_slice(bytes)
                .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {}", err)))?;
            return Ok(Some(value));
        }
        let text = String::from_utf8(bytes.clone())
            .map_err(|_| ApiError::bad_request("request body must be valid UTF-8"))?;
        Ok(Some(Value::String(text)))
    }

    fn raw_body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_ascii_lowercase()).cloned()
    }
}

/// Parse a query string, folding repeated keys into arrays
fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let mut parsed = Map::new();
    let Some(query) = query else {
        return parsed;
    };
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = match urlencoding::decode(key) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => key.to_string(),
        };
        let value = match urlencoding::decode(value) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => value.to_string(),
        };
        match parsed.get_mut(&key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                parsed.insert(key, Value::String(value));
            }
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_query_simple() {
        let parsed = parse_query(Some("a=1&b=two"));
        assert_eq!(parsed.get("a"), Some(&json!("1")));
        assert_eq!(parsed.get("b"), Some(&json!("two")));
    }

    #[test]
    fn test_parse_query_repeated_keys_fold_to_array() {
        let parsed = parse_query(Some("tag=a&tag=b&tag=c"));
        assert_eq!(parsed.get("tag"), Some(&json!(["a", "b", "c"])));
    }

    #[test]
    fn test_parse_query_percent_decoding() {
        let parsed = parse_query(Some("q=hello%20world&empty"));
        assert_eq!(parsed.get("q"), Some(&json!("hello world")));
        assert_eq!(parsed.get("empty"), Some(&json!("")));
    }

    #[test]
    fn test_parse_query_none() {
        assert!(parse_query(None).is_empty());
    }
}
