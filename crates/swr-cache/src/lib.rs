//! # SWR Cache
//!
//! Named, versioned cache buckets mapping GET requests to stored responses.
//!
//! ## Architecture
//!
//! ```text
//! CacheStore (caches)
//!     └── Cache "caps-kingdom-v2"
//!             └── GET url → CacheEntry
//! ```
//!
//! Buckets are never evicted entry by entry. A new version string gets a new
//! bucket and the old bucket is deleted wholesale on activation.

use thiserror::Error;

pub mod bucket;
pub mod entry;
pub mod store;

pub use bucket::Cache;
pub use entry::CacheEntry;
pub use store::{CacheSnapshot, CacheStore, MemoryCacheStore};

/// Errors that can occur in cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache not found: {0}")]
    NotFound(String),

    #[error("Only GET requests can be cached, got {0}")]
    MethodNotAllowed(String),

    #[error("Invalid cache entry: {0}")]
    InvalidEntry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl From<CacheError> for swr_common::SwrError {
    fn from(err: CacheError) -> Self {
        swr_common::SwrError::cache_with_source("cache operation failed", err)
    }
}
