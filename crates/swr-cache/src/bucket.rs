//! A single named cache bucket.

use hashbrown::HashMap;
use http::Method;
use serde::{Deserialize, Serialize};
use swr_net::{Request, Response};
use url::Url;

use crate::{CacheEntry, CacheError};

/// Cache key for a GET request: the URL without its fragment.
pub fn request_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// A cache bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cache {
    /// Cache name (the version string).
    pub name: String,

    /// Cached entries by request key.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new, empty cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request URL.
    pub fn match_url(&self, url: &Url) -> Option<&CacheEntry> {
        self.entries.get(&request_key(url))
    }

    /// Store a response, replacing any previous entry for the same request.
    pub fn put(&mut self, request: &Request, response: &Response) -> Result<(), CacheError> {
        if request.method != Method::GET {
            return Err(CacheError::MethodNotAllowed(request.method.to_string()));
        }
        self.entries.insert(
            request_key(&request.url),
            CacheEntry::from_response(request, response),
        );
        Ok(())
    }

    /// Get all keys (URLs), sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_cache() {
        let mut cache = Cache::new("v1");
        let u = url("https://example.com/style.css");
        cache
            .put(&Request::get(u.clone()), &Response::basic(u.clone(), "a{}"))
            .unwrap();

        assert!(cache.match_url(&u).is_some());
        assert!(cache.match_url(&url("https://example.com/other.css")).is_none());
    }

    #[test]
    fn test_fragment_is_ignored() {
        let mut cache = Cache::new("v1");
        let u = url("https://example.com/index.html#top");
        cache
            .put(&Request::navigate(u.clone()), &Response::basic(u, "<html>"))
            .unwrap();

        assert!(cache.match_url(&url("https://example.com/index.html")).is_some());
    }

    #[test]
    fn test_put_overwrites() {
        let mut cache = Cache::new("v1");
        let u = url("https://example.com/app.js");
        let request = Request::get(u.clone());
        cache.put(&request, &Response::basic(u.clone(), "old")).unwrap();
        cache.put(&request, &Response::basic(u.clone(), "new")).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(&cache.match_url(&u).unwrap().body[..], b"new");
    }

    #[test]
    fn test_non_get_rejected() {
        let mut cache = Cache::new("v1");
        let u = url("https://example.com/api");
        let result = cache.put(
            &Request::get(u.clone()).method(Method::POST),
            &Response::basic(u, "{}"),
        );
        assert!(matches!(result, Err(CacheError::MethodNotAllowed(m)) if m == "POST"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keys_sorted() {
        let mut cache = Cache::new("test");
        for path in ["b.js", "a.js"] {
            let u = url(&format!("https://example.com/{}", path));
            cache.put(&Request::get(u.clone()), &Response::basic(u, "")).unwrap();
        }

        assert_eq!(
            cache.keys(),
            vec!["https://example.com/a.js", "https://example.com/b.js"]
        );
        assert_eq!(cache.len(), 2);
    }
}
