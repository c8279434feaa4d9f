//! Network fetching.

use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use reqwest::Client;
use tracing::{debug, info, trace};
use url::Url;

use crate::{NetError, Request, Response, ResponseType};

/// A single-attempt network fetch.
///
/// An `Err` means the fetch was rejected (no response at all). HTTP error
/// statuses are returned as `Ok` responses.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError>;
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string.
    pub user_agent: String,
    /// Accept-Language header.
    pub accept_language: String,
    /// Client-level timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("swr/{}", env!("CARGO_PKG_VERSION")),
            accept_language: "es-ES,es;q=0.9,en;q=0.8".to_string(),
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

/// [`Fetcher`] backed by `reqwest`.
///
/// Responses are classified against `origin`, the origin the worker is
/// installed for.
pub struct HttpFetcher {
    client: Client,
    config: LoaderConfig,
    origin: Url,
}

impl HttpFetcher {
    /// Create a new fetcher for the given worker origin.
    pub fn new(origin: Url, config: LoaderConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        info!(origin = %origin, "HttpFetcher initialized");

        Ok(Self {
            client,
            config,
            origin,
        })
    }

    /// The origin responses are classified against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn classify(&self, request: &Request, final_url: &Url, headers: &HeaderMap) -> ResponseType {
        if final_url != &request.url {
            return ResponseType::OpaqueRedirect;
        }
        if final_url.origin() == self.origin.origin() {
            return ResponseType::Basic;
        }
        if headers.contains_key("access-control-allow-origin") {
            ResponseType::Cors
        } else {
            ResponseType::Opaque
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, mode = ?request.mode, "Fetching resource");

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in request.headers.iter() {
            req_builder = req_builder.header(name, value);
        }
        req_builder = req_builder.header("Accept-Language", &self.config.accept_language);

        let response = req_builder.send().await.map_err(|e| {
            if e.is_connect() {
                NetError::Offline(e.to_string())
            } else {
                NetError::HttpError(e)
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let response_type = self.classify(request, &url, &headers);
        let body = response.bytes().await?;

        trace!(
            url = %url,
            status = %status,
            response_type = response_type.as_str(),
            body_len = body.len(),
            "Response received"
        );

        Ok(Response {
            url,
            status,
            headers,
            response_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(origin: &str) -> HttpFetcher {
        HttpFetcher::new(Url::parse(origin).unwrap(), LoaderConfig::default()).unwrap()
    }

    #[test]
    fn test_loader_config_default() {
        let config = LoaderConfig::default();
        assert!(config.user_agent.starts_with("swr/"));
        assert_eq!(config.max_redirects, 10);
    }

    #[tokio::test]
    async fn test_same_origin_is_basic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/style.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body{}"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri());
        let url = Url::parse(&format!("{}/style.css", server.uri())).unwrap();
        let response = fetcher.fetch(&Request::get(url)).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.response_type, ResponseType::Basic);
        assert_eq!(response.text().unwrap(), "body{}");
        assert!(response.is_storable());
    }

    #[tokio::test]
    async fn test_cross_origin_is_opaque_or_cors() {
        let server = MockServer::start().await;
        Mock::given(path("/font.css"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(path("/api.json"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("access-control-allow-origin", "*"),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher_for("https://caps.example");

        let font = Url::parse(&format!("{}/font.css", server.uri())).unwrap();
        let response = fetcher.fetch(&Request::get(font)).await.unwrap();
        assert_eq!(response.response_type, ResponseType::Opaque);

        let api = Url::parse(&format!("{}/api.json", server.uri())).unwrap();
        let response = fetcher.fetch(&Request::get(api)).await.unwrap();
        assert_eq!(response.response_type, ResponseType::Cors);
    }

    #[tokio::test]
    async fn test_redirect_is_not_basic() {
        let server = MockServer::start().await;
        Mock::given(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri());
        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
        let response = fetcher.fetch(&Request::get(url)).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.response_type, ResponseType::OpaqueRedirect);
        assert!(!response.is_storable());
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(path("/missing.js"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri());
        let url = Url::parse(&format!("{}/missing.js", server.uri())).unwrap();
        let response = fetcher.fetch(&Request::get(url)).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unreachable_host_rejects() {
        let fetcher = fetcher_for("http://127.0.0.1:9");
        let url = Url::parse("http://127.0.0.1:9/index.html").unwrap();
        assert!(matches!(
            fetcher.fetch(&Request::navigate(url)).await,
            Err(NetError::Offline(_))
        ));
    }
}
