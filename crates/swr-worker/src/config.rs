//! Worker configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use swr_common::{SwrError, Result};
use swr_net::UrlPattern;
use url::Url;

use crate::notification::NotificationAction;

const FONTS_STYLESHEET: &str = "https://fonts.googleapis.com/css2?family=Oswald:wght@400;500;600;700&family=Inter:wght@300;400;500;600&display=swap";

const ICON_SVG: &str = "data:image/svg+xml,<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 100 100\"><rect fill=\"%23000\" width=\"100\" height=\"100\"/><text y=\".9em\" x=\"50%\" text-anchor=\"middle\" font-size=\"70\">🧢</text></svg>";

const BADGE_SVG: &str = "data:image/svg+xml,<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 100 100\"><text y=\".9em\" font-size=\"90\">🧢</text></svg>";

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Bucket name. Bumping it is the only way to invalidate cached content.
    pub cache_name: String,

    /// Origin the worker is installed for. Root-relative URLs resolve
    /// against it.
    pub origin: Url,

    /// Assets fetched and stored at install time, in order.
    pub precache: Vec<String>,

    /// Document served to navigations when the network is unreachable.
    pub offline_fallback: String,

    /// Requests matching any of these are never intercepted.
    pub exclusions: Vec<UrlPattern>,

    /// Which responses are written to the cache on a miss.
    pub store: StoreRules,

    /// Push notification defaults
    pub notifications: NotificationDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreRules {
    /// URL suffixes that are stored (`.html`, `.css`, `.js`).
    pub suffixes: Vec<String>,

    /// Substrings marking font providers.
    pub markers: Vec<String>,

    /// Image extensions, matched case-insensitively at the end of the URL.
    pub image_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub url: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: "caps-kingdom-v2".to_string(),
            origin: Url::parse("http://localhost:8080/").expect("static origin is valid"),
            precache: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/admin.html".to_string(),
                "/manifest.json".to_string(),
                FONTS_STYLESHEET.to_string(),
            ],
            offline_fallback: "/index.html".to_string(),
            exclusions: vec![
                UrlPattern::prefix("chrome-extension://"),
                UrlPattern::contains("extension"),
                UrlPattern::contains("google-analytics.com"),
                UrlPattern::contains("googletagmanager.com"),
            ],
            store: StoreRules::default(),
            notifications: NotificationDefaults::default(),
        }
    }
}

impl Default for StoreRules {
    fn default() -> Self {
        Self {
            suffixes: vec![".html".into(), ".css".into(), ".js".into()],
            markers: vec!["fonts.googleapis".into(), "fonts.gstatic".into()],
            image_extensions: ["png", "jpg", "jpeg", "gif", "svg", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "CAPS KINGDOM".to_string(),
            body: "¡Tenemos novedades para ti!".to_string(),
            url: "/".to_string(),
            icon: ICON_SVG.to_string(),
            badge: BADGE_SVG.to_string(),
            vibrate: vec![100, 50, 100],
            actions: vec![
                NotificationAction::new("open", "Ver ahora"),
                NotificationAction::new("close", "Cerrar"),
            ],
        }
    }
}

impl WorkerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            SwrError::config_with_source(format!("reading {}", path.display()), e)
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            SwrError::config_with_source(format!("parsing {}", path.display()), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.cache_name.trim().is_empty() {
            return Err(SwrError::config("cache_name must not be empty"));
        }
        if self.origin.cannot_be_a_base() {
            return Err(SwrError::config(format!(
                "origin {} cannot resolve relative URLs",
                self.origin
            )));
        }
        self.resolve(&self.offline_fallback)?;
        self.precache_urls()?;
        Ok(())
    }

    /// Resolve a root-relative or absolute URL against the origin.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.origin
            .join(url)
            .map_err(|e| SwrError::config_with_source(format!("invalid URL '{}'", url), e))
    }

    /// The precache list as absolute URLs, in order.
    pub fn precache_urls(&self) -> Result<Vec<Url>> {
        self.precache.iter().map(|u| self.resolve(u)).collect()
    }

    /// Sets the cache name.
    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    /// Sets the origin.
    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the precache list.
    pub fn with_precache<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = urls.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.cache_name, "caps-kingdom-v2");
        assert_eq!(config.precache.len(), 5);
        assert_eq!(config.offline_fallback, "/index.html");
        assert_eq!(config.exclusions.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn precache_resolves_against_origin() {
        let config = WorkerConfig::new()
            .with_origin(Url::parse("https://caps.example/").unwrap())
            .with_precache(["/", "/manifest.json", "https://cdn.example/lib.js"]);

        let urls: Vec<String> = config
            .precache_urls()
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://caps.example/",
                "https://caps.example/manifest.json",
                "https://cdn.example/lib.js",
            ]
        );
    }

    #[test]
    fn empty_cache_name_rejected() {
        let config = WorkerConfig::new().with_cache_name("  ");
        assert!(matches!(config.validate(), Err(SwrError::Config { .. })));
    }

    #[test]
    fn partial_json_takes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.json");
        std::fs::write(
            &path,
            r#"{ "cache_name": "caps-kingdom-v3", "origin": "https://caps.example/" }"#,
        )
        .unwrap();

        let config = WorkerConfig::load(&path).unwrap();
        assert_eq!(config.cache_name, "caps-kingdom-v3");
        assert_eq!(config.origin.as_str(), "https://caps.example/");
        assert_eq!(config.store.image_extensions.len(), 6);
        assert_eq!(config.notifications.title, "CAPS KINGDOM");
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorkerConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.category(), "config");
    }
}
