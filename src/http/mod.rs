//! Minimal HTTP abstraction so the client never depends on a concrete HTTP library.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Serialize;

use crate::error::ChatError;

pub mod reqwest;

/// HTTP methods the client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Outbound request. Chat and moderation calls are JSON POSTs; account queries are GETs.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Serializes `body` as JSON and stamps the `Content-Type` header.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley_chat::http::HttpRequest;
    /// use serde_json::json;
    ///
    /// let request = HttpRequest::json("https://example.com", &json!({"ping": 1})).unwrap();
    /// assert_eq!(request.headers.get("Content-Type").map(String::as_str), Some("application/json"));
    /// assert_eq!(request.body, br#"{"ping":1}"#.to_vec());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Validation`] when the body cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(url: impl Into<String>, body: &T) -> Result<Self, ChatError> {
        let payload = serde_json::to_vec(body).map_err(|err| ChatError::Validation {
            message: format!("failed to serialize request: {err}"),
        })?;
        Ok(Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body: payload,
        })
    }

    /// Bodyless GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Merges caller supplied headers over the defaults.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Case-insensitive header lookup shared by both response shapes.
fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley_chat::http::HttpResponse;
    ///
    /// let response = HttpResponse { status: 200, headers: Default::default(), body: b"ok".to_vec() };
    /// assert_eq!(response.text().unwrap(), "ok");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Transport`] when the body is not valid UTF-8.
    pub fn text(&self) -> Result<&str, ChatError> {
        std::str::from_utf8(&self.body).map_err(|err| ChatError::transport(err.to_string()))
    }
}

/// Alias for the body stream returned by [`HttpTransport::send_stream`].
pub type HttpBodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ChatError>> + Send>>;

/// Response whose body is still arriving.
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: HttpBodyStream,
}

impl HttpStreamResponse {
    pub fn content_type(&self) -> Option<&str> {
        find_header(&self.headers, "content-type")
    }
}

/// Drains a streaming body into memory.
pub async fn collect_body(mut body: HttpBodyStream) -> Result<Vec<u8>, ChatError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    Ok(bytes)
}

/// HTTP client seam. Production code uses [`reqwest::ReqwestTransport`]; tests plug in
/// in-memory implementations.
///
/// Dropping a returned future or body stream must abort the underlying connection; the
/// client relies on this for cancellation and timeouts.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and resolves once the whole body has been read.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ChatError>;

    /// Sends a request and resolves once the response head is available.
    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, ChatError>;
}

/// Thread-safe handle to a transport implementation.
pub type DynHttpTransport = Arc<dyn HttpTransport>;
