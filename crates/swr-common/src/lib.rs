//! # SWR Common
//!
//! Error types and logging configuration shared by the offline caching
//! worker crates.
//!
//! ## Features
//!
//! - Unified error type with per-category helpers
//! - Logging configuration and setup

use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for the worker crates.
#[derive(Error, Debug)]
pub enum SwrError {
    /// Network-related errors.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cache storage errors.
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Install (precache) errors.
    #[error("Install error: {message}")]
    Install {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error (unexpected).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwrError {
    /// Create a network error with source.
    pub fn network_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a cache error with source.
    pub fn cache_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Cache {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an install error with source.
    pub fn install_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Install {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error category for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            SwrError::Network { .. } => "network",
            SwrError::Cache { .. } => "cache",
            SwrError::Install { .. } => "install",
            SwrError::Config { .. } => "config",
            SwrError::Json(_) => "json",
            SwrError::InvalidArgument(_) => "invalid_argument",
            SwrError::Internal(_) => "internal",
        }
    }
}

/// Result type alias for worker operations.
pub type Result<T> = std::result::Result<T, SwrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct Reset;

    #[test]
    fn test_error_categories() {
        assert_eq!(SwrError::network_with_source("fetch", Reset).category(), "network");
        assert_eq!(SwrError::cache_with_source("put", Reset).category(), "cache");
        assert_eq!(SwrError::install_with_source("/", Reset).category(), "install");
        assert_eq!(SwrError::config("empty name").category(), "config");
        assert_eq!(SwrError::Internal("x".into()).category(), "internal");
    }

    #[test]
    fn test_source_is_kept() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = SwrError::config_with_source("reading worker config", io);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "Config error: reading worker config");
    }

    #[test]
    fn test_json_conversion() {
        let parsed: Result<serde_json::Value> = serde_json::from_str("{").map_err(SwrError::from);
        assert_eq!(parsed.unwrap_err().category(), "json");
    }
}
