//! # SWR Net
//!
//! Request/response model and network access for the offline caching worker.
//!
//! ## Design Goals
//!
//! 1. **Cloneable responses**: a response can be handed to the page and
//!    written to the cache without re-reading a stream
//! 2. **Response typing**: every response carries a `basic`/`cors`/`opaque`
//!    classification relative to the worker origin
//! 3. **Swappable network**: the worker talks to a [`Fetcher`] trait so tests
//!    can script the network

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub mod fetch;
pub mod pattern;

pub use fetch::{Fetcher, HttpFetcher, LoaderConfig};
pub use pattern::{PatternType, UrlPattern};

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// No connection could be made.
    #[error("Offline: {0}")]
    Offline(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<NetError> for swr_common::SwrError {
    fn from(err: NetError) -> Self {
        swr_common::SwrError::network_with_source("fetch rejected", err)
    }
}

/// Request mode, as seen by the fetch handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    /// Same-origin only.
    SameOrigin,
    /// Subresource without CORS.
    #[default]
    NoCors,
    /// CORS request.
    Cors,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub mode: RequestMode,
}

impl Request {
    /// Create a GET request for a subresource.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            mode: RequestMode::NoCors,
        }
    }

    /// Create a GET request for a page navigation.
    pub fn navigate(url: Url) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    /// Set the method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the mode.
    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Whether this request loads a full page document.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// Classification of a response relative to the worker origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseType {
    /// Same-origin, non-redirected.
    Basic,
    /// Cross-origin with CORS headers.
    Cors,
    /// Cross-origin without CORS.
    Opaque,
    /// Redirected response.
    OpaqueRedirect,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::OpaqueRedirect => "opaqueredirect",
        }
    }
}

/// A fully buffered HTTP response.
///
/// The body is a [`Bytes`] handle, so `clone()` is cheap and both copies
/// observe the same bytes.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub response_type: ResponseType,
    pub body: Bytes,
}

impl Response {
    /// Create a response.
    pub fn new(url: Url, status: StatusCode, response_type: ResponseType, body: Bytes) -> Self {
        Self {
            url,
            status,
            headers: HeaderMap::new(),
            response_type,
            body,
        }
    }

    /// Create a same-origin `200 OK` response.
    pub fn basic(url: Url, body: impl Into<Bytes>) -> Self {
        Self::new(url, StatusCode::OK, ResponseType::Basic, body.into())
    }

    /// Add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Check if request was successful (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Whether this response may be written to the cache on a miss:
    /// exactly `200` and same-origin.
    pub fn is_storable(&self) -> bool {
        self.status == StatusCode::OK && self.response_type == ResponseType::Basic
    }

    /// Get the body as text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::RequestFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_request_builder() {
        let request = Request::get(url("https://example.com/app.js"))
            .header(
                HeaderName::from_static("accept"),
                HeaderValue::from_static("*/*"),
            )
            .method(Method::HEAD);

        assert_eq!(request.method, Method::HEAD);
        assert_eq!(request.mode, RequestMode::NoCors);
        assert!(request.headers.contains_key("accept"));
        assert!(!request.is_navigation());
    }

    #[test]
    fn test_navigation_request() {
        let request = Request::navigate(url("https://example.com/"));
        assert!(request.is_navigation());
        assert_eq!(request.method, Method::GET);
    }

    #[test]
    fn test_storable_requires_ok_and_basic() {
        let u = url("https://example.com/style.css");
        assert!(Response::basic(u.clone(), "body{}").is_storable());

        let not_found = Response::new(u.clone(), StatusCode::NOT_FOUND, ResponseType::Basic, Bytes::new());
        assert!(!not_found.is_storable());

        let opaque = Response::new(u.clone(), StatusCode::OK, ResponseType::Opaque, Bytes::new());
        assert!(!opaque.is_storable());

        let partial = Response::new(u, StatusCode::PARTIAL_CONTENT, ResponseType::Basic, Bytes::new());
        assert!(partial.ok());
        assert!(!partial.is_storable());
    }

    #[test]
    fn test_clone_shares_body() {
        let response = Response::basic(url("https://example.com/"), "<html></html>");
        let copy = response.clone();
        assert_eq!(copy.body, response.body);
        assert_eq!(copy.text().unwrap(), "<html></html>");
    }

    #[test]
    fn test_response_type_names() {
        assert_eq!(ResponseType::Basic.as_str(), "basic");
        assert_eq!(ResponseType::OpaqueRedirect.as_str(), "opaqueredirect");
    }
}
