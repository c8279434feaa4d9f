//! URL patterns for request filtering.

use serde::{Deserialize, Serialize};
use url::Url;

/// Type of URL pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Exact URL match.
    Exact,
    /// Prefix match (e.g., a scheme).
    Prefix,
    /// Suffix match (e.g., a file extension).
    Suffix,
    /// Contains substring.
    Contains,
}

/// URL pattern for matching.
///
/// Patterns match against the serialized URL, so a `contains` pattern also
/// sees the query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPattern {
    /// Pattern type.
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    /// Pattern string.
    pub pattern: String,
}

impl UrlPattern {
    /// Create an exact match pattern.
    pub fn exact(url: &str) -> Self {
        Self {
            pattern_type: PatternType::Exact,
            pattern: url.to_string(),
        }
    }

    /// Create a prefix match pattern.
    pub fn prefix(prefix: &str) -> Self {
        Self {
            pattern_type: PatternType::Prefix,
            pattern: prefix.to_string(),
        }
    }

    /// Create a suffix match pattern.
    pub fn suffix(suffix: &str) -> Self {
        Self {
            pattern_type: PatternType::Suffix,
            pattern: suffix.to_string(),
        }
    }

    /// Create a contains pattern.
    pub fn contains(substring: &str) -> Self {
        Self {
            pattern_type: PatternType::Contains,
            pattern: substring.to_string(),
        }
    }

    /// Check if a URL matches this pattern.
    pub fn matches(&self, url: &Url) -> bool {
        self.matches_str(url.as_str())
    }

    /// Check a raw URL string.
    pub fn matches_str(&self, url: &str) -> bool {
        match self.pattern_type {
            PatternType::Exact => url == self.pattern,
            PatternType::Prefix => url.starts_with(&self.pattern),
            PatternType::Suffix => url.ends_with(&self.pattern),
            PatternType::Contains => url.contains(&self.pattern),
        }
    }
}
