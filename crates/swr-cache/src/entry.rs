//! Stored responses.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use swr_net::{Request, Response, ResponseType};
use url::Url;

use crate::CacheError;

/// A cached request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers, in wire order. Values are raw bytes: `http`
    /// allows obs-text (0x80-0xFF) that is not valid `str`.
    pub headers: Vec<(String, Bytes)>,

    /// Response type at the time of storing.
    pub response_type: ResponseType,

    /// Response body.
    pub body: Bytes,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Capture a response for storage under `request`.
    pub fn from_response(request: &Request, response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    Bytes::copy_from_slice(value.as_bytes()),
                )
            })
            .collect();

        Self {
            url: request.url.to_string(),
            method: request.method.to_string(),
            status: response.status.as_u16(),
            headers,
            response_type: response.response_type,
            body: response.body.clone(),
            cached_at: now_millis(),
        }
    }

    /// Rebuild a response from the stored entry.
    pub fn to_response(&self) -> Result<Response, CacheError> {
        let url = Url::parse(&self.url).map_err(|e| CacheError::InvalidEntry(e.to_string()))?;
        let status =
            StatusCode::from_u16(self.status).map_err(|e| CacheError::InvalidEntry(e.to_string()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| CacheError::InvalidEntry(e.to_string()))?;
            let value = HeaderValue::from_bytes(value)
                .map_err(|e| CacheError::InvalidEntry(e.to_string()))?;
            headers.append(name, value);
        }

        Ok(Response {
            url,
            status,
            headers,
            response_type: self.response_type,
            body: self.body.clone(),
        })
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_restores_response() {
        let url = Url::parse("https://caps.example/style.css").unwrap();
        let response = Response::basic(url.clone(), "body{color:red}").with_header(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("text/css"),
        );

        let entry = CacheEntry::from_response(&Request::get(url), &response);
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.status, 200);
        assert!(entry.cached_at > 0);

        let restored = entry.to_response().unwrap();
        assert_eq!(restored.body, response.body);
        assert_eq!(restored.status, StatusCode::OK);
        assert_eq!(restored.response_type, ResponseType::Basic);
        assert_eq!(restored.headers.get("content-type").unwrap(), "text/css");
    }

    #[test]
    fn test_non_ascii_header_survives() {
        let url = Url::parse("https://caps.example/download.js").unwrap();
        let disposition = HeaderValue::from_bytes(b"attachment; filename=\"caf\xe9.js\"").unwrap();
        let response = Response::basic(url.clone(), "x")
            .with_header(HeaderName::from_static("content-disposition"), disposition.clone());

        let entry = CacheEntry::from_response(&Request::get(url), &response);
        let json = serde_json::to_string(&entry).unwrap();
        let entry: CacheEntry = serde_json::from_str(&json).unwrap();

        let restored = entry.to_response().unwrap();
        assert_eq!(restored.headers, response.headers);
        assert_eq!(restored.headers.get("content-disposition"), Some(&disposition));
    }

    #[test]
    fn test_repeated_headers_keep_order() {
        let url = Url::parse("https://caps.example/").unwrap();
        let mut response = Response::basic(url.clone(), "<html>");
        for cookie in ["a=1", "b=2"] {
            response
                .headers
                .append("set-cookie", HeaderValue::from_static(cookie));
        }

        let restored = CacheEntry::from_response(&Request::get(url), &response)
            .to_response()
            .unwrap();
        let cookies: Vec<_> = restored.headers.get_all("set-cookie").iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_invalid_entry_is_rejected() {
        let entry = CacheEntry {
            url: "not a url".into(),
            method: "GET".into(),
            status: 200,
            headers: Vec::new(),
            response_type: ResponseType::Basic,
            body: Bytes::new(),
            cached_at: 0,
        };
        assert!(matches!(entry.to_response(), Err(CacheError::InvalidEntry(_))));
    }
}
