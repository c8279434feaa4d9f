//! Which fresh responses are written to the cache.

use regex::{Regex, RegexBuilder};
use url::Url;

use crate::config::StoreRules;
use crate::WorkerError;

/// Store decision for successful same-origin responses on a cache miss.
///
/// A URL is stored iff it ends with one of the suffixes, contains one of the
/// font markers, or ends with an image extension (any case). Matching runs on
/// the full serialized URL, query string included.
#[derive(Debug, Clone)]
pub struct StorePolicy {
    suffixes: Vec<String>,
    markers: Vec<String>,
    images: Option<Regex>,
}

impl StorePolicy {
    pub fn new(rules: &StoreRules) -> Result<Self, WorkerError> {
        let images = if rules.image_extensions.is_empty() {
            None
        } else {
            let alternation = rules
                .image_extensions
                .iter()
                .map(|ext| regex::escape(ext.trim_start_matches('.')))
                .collect::<Vec<_>>()
                .join("|");
            Some(
                RegexBuilder::new(&format!(r"\.({})$", alternation))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self {
            suffixes: rules.suffixes.clone(),
            markers: rules.markers.clone(),
            images,
        })
    }

    pub fn should_store(&self, url: &Url) -> bool {
        let url = url.as_str();
        self.suffixes.iter().any(|s| url.ends_with(s.as_str()))
            || self.markers.iter().any(|m| url.contains(m.as_str()))
            || self.images.as_ref().is_some_and(|re| re.is_match(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> StorePolicy {
        StorePolicy::new(&StoreRules::default()).unwrap()
    }

    fn stores(url: &str) -> bool {
        policy().should_store(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_documents_and_code_stored() {
        assert!(stores("https://caps.example/admin.html"));
        assert!(stores("https://caps.example/style.css"));
        assert!(stores("https://caps.example/js/app.js"));
    }

    #[test]
    fn test_data_not_stored() {
        assert!(!stores("https://caps.example/data.json"));
        assert!(!stores("https://caps.example/manifest.json"));
        assert!(!stores("https://caps.example/"));
        assert!(!stores("https://caps.example/app.mjs"));
    }

    #[test]
    fn test_query_string_defeats_suffix() {
        assert!(!stores("https://caps.example/style.css?v=3"));
    }

    #[test]
    fn test_font_providers_stored() {
        assert!(stores("https://fonts.googleapis.com/css2?family=Oswald&display=swap"));
        assert!(stores("https://fonts.gstatic.com/s/inter/v12/abc.woff2"));
    }

    #[test]
    fn test_images_case_insensitive() {
        for url in [
            "https://caps.example/img/cap.png",
            "https://caps.example/img/cap.JPG",
            "https://caps.example/img/cap.jpeg",
            "https://caps.example/img/cap.Gif",
            "https://caps.example/logo.svg",
            "https://caps.example/hero.WEBP",
        ] {
            assert!(stores(url), "{} should be stored", url);
        }
        assert!(!stores("https://caps.example/img/cap.bmp"));
        assert!(!stores("https://caps.example/img/png"));
    }

    #[test]
    fn test_no_image_rule() {
        let rules = StoreRules {
            image_extensions: Vec::new(),
            ..StoreRules::default()
        };
        let policy = StorePolicy::new(&rules).unwrap();
        assert!(!policy.should_store(&Url::parse("https://caps.example/a.png").unwrap()));
        assert!(policy.should_store(&Url::parse("https://caps.example/a.css").unwrap()));
    }
}
