//! Which requests take part in the cache policy at all.

use http::Method;
use swr_net::{Request, UrlPattern};
use tracing::trace;

/// Why a request was left to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Only GET requests are cached.
    Method(Method),
    /// The URL matched an exclusion pattern.
    Pattern(UrlPattern),
}

/// Result of the eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Excluded(Exclusion),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Pure predicate over intercepted requests.
///
/// Rules run in order and the first match excludes: non-GET methods, then
/// each configured URL pattern.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    exclusions: Vec<UrlPattern>,
}

impl EligibilityFilter {
    pub fn new(exclusions: Vec<UrlPattern>) -> Self {
        Self { exclusions }
    }

    pub fn check(&self, request: &Request) -> Eligibility {
        if request.method != Method::GET {
            return Eligibility::Excluded(Exclusion::Method(request.method.clone()));
        }

        if let Some(pattern) = self.exclusions.iter().find(|p| p.matches(&request.url)) {
            trace!(url = %request.url, pattern = %pattern.pattern, "Excluded by pattern");
            return Eligibility::Excluded(Exclusion::Pattern(pattern.clone()));
        }

        Eligibility::Eligible
    }

    pub fn is_eligible(&self, request: &Request) -> bool {
        self.check(request).is_eligible()
    }
}
