//! Request header sources.

use std::collections::HashMap;
use std::sync::Arc;

/// Supplies the headers attached to every outbound request (auth, org ids, proxy keys).
///
/// Called once per HTTP request, so implementations may rotate credentials.
pub trait HeaderSource: Send + Sync {
    fn headers(&self) -> HashMap<String, String>;
}

/// Thread-safe handle to a header source.
pub type DynHeaderSource = Arc<dyn HeaderSource>;

/// Fixed header set.
///
/// # Examples
///
/// ```
/// use parley_chat::headers::{HeaderSource, StaticHeaders};
///
/// let headers = StaticHeaders::bearer("sk-test").with("OpenAI-Organization", "org-1");
/// let map = headers.headers();
/// assert_eq!(map.get("Authorization").map(String::as_str), Some("Bearer sk-test"));
/// assert_eq!(map.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    headers: HashMap<String, String>,
}

impl StaticHeaders {
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self { headers }
    }

    /// `Authorization: Bearer <key>` as used by OpenAI-compatible endpoints.
    pub fn bearer(api_key: impl AsRef<str>) -> Self {
        Self::default().with("Authorization", format!("Bearer {}", api_key.as_ref()))
    }

    /// `api-key: <key>` as used by Azure OpenAI deployments.
    pub fn azure(api_key: impl Into<String>) -> Self {
        Self::default().with("api-key", api_key)
    }

    /// `x-goog-api-key: <key>` as used by the Generative Language API.
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::default().with("x-goog-api-key", api_key)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl HeaderSource for StaticHeaders {
    fn headers(&self) -> HashMap<String, String> {
        self.headers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_helpers_use_their_auth_header() {
        assert_eq!(
            StaticHeaders::azure("k").headers().get("api-key").map(String::as_str),
            Some("k")
        );
        assert_eq!(
            StaticHeaders::gemini("g")
                .headers()
                .get("x-goog-api-key")
                .map(String::as_str),
            Some("g")
        );
    }

    #[test]
    fn empty_source_has_no_headers() {
        assert!(StaticHeaders::default().headers().is_empty());
    }
}
