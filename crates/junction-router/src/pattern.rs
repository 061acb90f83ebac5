//! Path-template matching with named `:param` segments
//!
//! Patterns compile to anchored regexes segment by segment; literal segments
//! are escaped, `:name` segments capture one path segment. A leading double
//! slash is normalized to a single slash in both the pattern and the
//! candidate path before matching.

use std::collections::HashMap;

use regex::Regex;

use junction_core::{ApiError, ApiResult};

/// A compiled path template
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    regex: Regex,
    params: Vec<String>,
}

impl PathPattern {
    /// Compile a template like `/v1/widgets/:id`
    pub fn new(pattern: &str) -> ApiResult<Self> {
        let pattern = normalize_path(pattern);
        let mut regex_pattern = String::from("^");
        let mut params = Vec::new();
        for segment in pattern.trim_start_matches('/').split('/') {
            regex_pattern.push('/');
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(ApiError::internal(format!(
                        "empty parameter name in pattern '{}'",
                        pattern
                    )));
                }
                if params.iter().any(|existing| existing == name) {
                    return Err(ApiError::internal(format!(
                        "duplicate parameter ':{}' in pattern '{}'",
                        name, pattern
                    )));
                }
                params.push(name.to_string());
                regex_pattern.push_str("([^/]+)");
            } else {
                regex_pattern.push_str(&regex::escape(segment));
            }
        }
        regex_pattern.push('$');
        let regex = Regex::new(&regex_pattern).map_err(|err| {
            ApiError::internal(format!("failed to compile pattern '{}': {}", pattern, err))
        })?;
        Ok(Self {
            pattern,
            regex,
            params,
        })
    }

    /// Match a concrete path, extracting named params on success
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path = normalize_path(path);
        let captures = self.regex.captures(&path)?;
        let mut extracted = HashMap::with_capacity(self.params.len());
        for (index, name) in self.params.iter().enumerate() {
            if let Some(value) = captures.get(index + 1) {
                extracted.insert(name.clone(), value.as_str().to_string());
            }
        }
        Some(extracted)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn param_names(&self) -> &[String] {
        &self.params
    }
}

/// Collapse a leading `//` to `/`
pub fn normalize_path(path: &str) -> String {
    match path.strip_prefix("//") {
        Some(rest) => format!("/{}", rest),
        None => path.to_string(),
    }
}
