//! Transport-agnostic HTTP request/response abstractions
//!
//! Every deployment target (embedded server, serverless shim, test double)
//! implements [`HttpRequest`] and [`HttpResponse`]; the runners only ever see
//! these traits. The default [`HttpRequest::data`] implementation defines the
//! canonical aggregation order: path params first, then query, then body,
//! with earlier sources never overwritten.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult, ErrorKind};

/// The fixed HTTP verb set routes can register under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Whether requests with this method conventionally carry a body
    pub fn has_body(&self) -> bool {
        matches!(
            self,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete
        )
    }
}

impl FromStr for HttpMethod {
    type Err = ApiError;

    /// Case-insensitive parse; unknown verbs map to `MethodNotAllowed`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(ApiError::new(ErrorKind::MethodNotAllowed)
                .with_message(format!("unsupported method '{}'", other))),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw (non-JSON) response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Binary(Vec<u8>),
}

/// SameSite attribute for response cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes for cookies written via [`HttpResponse::set_cookie`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieOptions {
    pub max_age: Option<i64>,
    pub expires: Option<chrono::DateTime<chrono::Utc>>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

/// Request view consumed by the runners, implemented per transport
pub trait HttpRequest: Send + Sync {
    fn method(&self) -> HttpMethod;

    fn path(&self) -> &str;

    /// Path params extracted by the matcher; empty until [`set_params`](Self::set_params)
    fn params(&self) -> &HashMap<String, String>;

    /// Written by the runner immediately after a route match, before any
    /// data aggregation runs
    fn set_params(&mut self, params: HashMap<String, String>);

    /// Parsed query string; repeated keys fold into arrays
    fn query(&self) -> Map<String, Value>;

    /// Parsed body, `None` when the request carries none
    fn body(&self) -> ApiResult<Option<Value>>;

    fn raw_body(&self) -> Option<&[u8]>;

    /// Header value by case-insensitive name
    fn header(&self, name: &str) -> Option<String>;

    /// Cookie jar derived from the `cookie` header
    fn cookies(&self) -> HashMap<String, String> {
        self.header("cookie")
            .map(|header| parse_cookie_header(&header))
            .unwrap_or_default()
    }

    /// Combined view: params, then query, then body, earlier sources win
    ///
    /// Path param names are reserved by the route pattern and can never be
    /// shadowed by query or body fields. A non-object body is returned as-is
    /// only when nothing else contributed.
    fn data(&self) -> ApiResult<Value> {
        let mut merged = Map::new();
        for (key, value) in self.params() {
            merged.insert(key.clone(), Value::String(value.clone()));
        }
        for (key, value) in self.query() {
            merged.entry(key).or_insert(value);
        }
        match self.body()? {
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
}

/// Response sink the runners write into, implemented per transport
pub trait HttpResponse: Send {
    fn set_status(&mut self, status: u16);

    /// JSON payload; the transport serializes at finalization time
    fn set_json(&mut self, value: Value);

    /// Raw text or binary payload for routes that bypass JSON encoding
    fn set_response(&mut self, body: ResponseBody);

    fn set_header(&mut self, name: &str, value: &str);

    fn set_cookie(&mut self, name: &str, value: &str, options: &CookieOptions);

    fn clear_cookie(&mut self, name: &str);

    fn set_redirect(&mut self, location: &str, status: u16);

    /// Finalize the response; further writes are a transport-level no-op
    fn end(&mut self);
}

/// Standard cookie-string parsing for the `cookie` request header
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryRequest;
    use serde_json::json;

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("BREW".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_parse_cookie_header() {
        let jar = parse_cookie_header("session=abc123; theme=dark ; malformed");
        assert_eq!(jar.get("session").map(String::as_str), Some("abc123"));
        assert_eq!(jar.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(jar.len(), 2);
    }

    #[test]
    fn test_data_params_never_overwritten() {
        let mut request = InMemoryRequest::new(HttpMethod::Post, "/v1/widgets/42")
            .with_query("id", json!("from-query"))
            .with_body(json!({"id": "from-body", "name": "Foo"}));
        request.set_params(HashMap::from([("id".to_string(), "42".to_string())]));

        let data = request.data().unwrap();
        assert_eq!(data["id"], json!("42"));
        assert_eq!(data["name"], json!("Foo"));
    }

    #[test]
    fn test_data_query_wins_over_body() {
        let request = InMemoryRequest::new(HttpMethod::Post, "/v1/widgets")
            .with_query("limit", json!("10"))
            .with_body(json!({"limit": 99, "name": "Foo"}));

        let data = request.data().unwrap();
        assert_eq!(data["limit"], json!("10"));
        assert_eq!(data["name"], json!("Foo"));
    }

    #[test]
    fn test_data_non_object_body_passthrough() {
        let request =
            InMemoryRequest::new(HttpMethod::Post, "/v1/bulk").with_body(json!([1, 2, 3]));
        assert_eq!(request.data().unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_cookies_from_header() {
        let request = InMemoryRequest::new(HttpMethod::Get, "/")
            .with_header("cookie", "auth=tok; other=1");
        assert_eq!(request.cookies().get("auth").map(String::as_str), Some("tok"));
    }
}
