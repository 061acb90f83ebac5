//! Hyper-backed response binding
//!
//! Writes are buffered while the runner executes and converted into a
//! `hyper::Response` once the request finishes; `end()` freezes the buffer
//! against later writes.

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use hyper::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use serde_json::Value;
use tracing::error;

use junction_core::{CookieOptions, HttpResponse, ResponseBody};

enum BufferedBody {
    Json(Value),
    Raw(ResponseBody),
}

/// Buffered response satisfying the core abstraction
#[derive(Default)]
pub struct HyperResponse {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: Option<BufferedBody>,
    redirect: Option<(String, u16)>,
    ended: bool,
}

impl HyperResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert the buffered writes into a hyper response
    pub fn into_hyper(self) -> Response<Full<Bytes>> {
        if let Some((location, status)) = self.redirect {
            return build_response(status, vec![(LOCATION.to_string(), location)], Bytes::new());
        }

        let mut headers = self.headers;
        let bytes = match self.body {
            Some(BufferedBody::Json(value)) => {
                if !headers
                    .iter()
                    .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
                {
                    headers.push((CONTENT_TYPE.to_string(), "application/json".to_string()));
                }
                match serde_json::to_vec(&value) {
                    Ok(encoded) => Bytes::from(encoded),
                    Err(err) => {
                        error!("failed to encode response body: {}", err);
                        return build_response(500, Vec::new(), Bytes::new());
                    }
                }
            }
            Some(BufferedBody::Raw(ResponseBody::Text(text))) => Bytes::from(text),
            Some(BufferedBody::Raw(ResponseBody::Binary(bytes))) => Bytes::from(bytes),
            None => Bytes::new(),
        };
        build_response(self.status.unwrap_or(200), headers, bytes)
    }
}

fn build_response(
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    match builder.body(Full::new(body)) {
        Ok(response) => response,
        Err(err) => {
            error!("failed to build response: {}", err);
            let mut fallback = Response::new(Full::new(Bytes::new()));
            *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        }
    }
}

impl HttpResponse for HyperResponse {
    fn set_status(&mut self, status: u16) {
        if !self.ended {
            self.status = Some(status);
        }
    }

    fn set_json(&mut self, value: Value) {
        if !self.ended {
            self.body = Some(BufferedBody::Json(value));
        }
    }

    fn set_response(&mut self, body: ResponseBody) {
        if !self.ended {
            self.body = Some(BufferedBody::Raw(body));
        }
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if !self.ended {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    fn set_cookie(&mut self, name: &str, value: &str, options: &CookieOptions) {
        if !self.ended {
            self.headers
                .push((SET_COOKIE.to_string(), format_set_cookie(name, value, options)));
        }
    }

    fn clear_cookie(&mut self, name: &str) {
        if !self.ended {
            self.headers.push((
                SET_COOKIE.to_string(),
                format!("{}=; Max-Age=0; Path=/", name),
            ));
        }
    }

    fn set_redirect(&mut self, location: &str, status: u16) {
        if !self.ended {
            self.redirect = Some((location.to_string(), status));
        }
    }

    fn end(&mut self) {
        self.ended = true;
    }
}

fn format_set_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut cookie = format!("{}={}", name, value);
    if let Some(max_age) = options.max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    if let Some(expires) = options.expires {
        cookie.push_str(&format!(
            "; Expires={}",
            expires.format("%a, %d %b %Y %H:%M:%S GMT")
        ));
    }
    if let Some(path) = &options.path {
        cookie.push_str(&format!("; Path={}", path));
    }
    if let Some(domain) = &options.domain {
        cookie.push_str(&format!("; Domain={}", domain));
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if let Some(same_site) = options.same_site {
        cookie.push_str(&format!("; SameSite={}", same_site.as_str()));
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::SameSite;
    use serde_json::json;

    #[test]
    fn test_json_response_conversion() {
        let mut response = HyperResponse::new();
        response.set_json(json!({"ok": true}));
        response.set_status(200);
        response.end();

        let hyper_response = response.into_hyper();
        assert_eq!(hyper_response.status(), 200);
        assert_eq!(
            hyper_response.headers().get(CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(b"application/json".as_ref())
        );
    }

    #[test]
    fn test_writes_after_end_are_ignored() {
        let mut response = HyperResponse::new();
        response.set_status(200);
        response.end();
        response.set_status(500);

        let hyper_response = response.into_hyper();
        assert_eq!(hyper_response.status(), 200);
    }

    #[test]
    fn test_redirect_conversion() {
        let mut response = HyperResponse::new();
        response.set_redirect("/login", 302);
        response.end();

        let hyper_response = response.into_hyper();
        assert_eq!(hyper_response.status(), 302);
        assert_eq!(
            hyper_response.headers().get(LOCATION).map(|v| v.as_bytes()),
            Some(b"/login".as_ref())
        );
    }

    #[test]
    fn test_cookie_formatting() {
        let options = CookieOptions {
            max_age: Some(3600),
            path: Some("/".to_string()),
            secure: true,
            http_only: true,
            same_site: Some(SameSite::Lax),
            ..Default::default()
        };
        let cookie = format_set_cookie("session", "abc", &options);
        assert_eq!(
            cookie,
            "session=abc; Max-Age=3600; Path=/; Secure; HttpOnly; SameSite=Lax"
        );
    }
}
