//! # SWR Worker
//!
//! Offline caching worker for a single web site.
//!
//! ## Features
//!
//! - **Lifecycle**: install (all-or-nothing precache), activate (old buckets
//!   deleted, clients claimed)
//! - **Fetch interception**: eligibility filter, stale-while-revalidate,
//!   offline fallback for navigations
//! - **Push**: notification display and click handling
//!
//! ## Architecture
//!
//! ```text
//! WorkerEvents (dispatch table)
//!     │
//!     └── OfflineWorker
//!             ├── EligibilityFilter
//!             ├── StorePolicy
//!             ├── CacheStore      (buckets)
//!             ├── Fetcher         (network)
//!             ├── BackgroundTasks (revalidation, cache writes)
//!             ├── Registration    (installing / waiting / active)
//!             ├── NotificationCenter
//!             └── ClientHost
//! ```

use swr_cache::CacheError;
use swr_net::NetError;
use thiserror::Error;

pub mod background;
pub mod clients;
pub mod config;
pub mod dispatch;
pub mod eligibility;
pub mod lifecycle;
pub mod notification;
pub mod store_policy;
pub mod worker;

pub use background::BackgroundTasks;
pub use clients::{Client, ClientHost, ClientMatchOptions, ClientType, WindowClients};
pub use config::{NotificationDefaults, StoreRules, WorkerConfig};
pub use dispatch::{dispatch, EventOutcome, FetchDecision, PlatformEvent, WorkerEvents};
pub use eligibility::{Eligibility, EligibilityFilter, Exclusion};
pub use lifecycle::{Registration, SharedRegistration, WorkerEvent, WorkerState, WorkerVersion};
pub use notification::{
    ClickOutcome, Notification, NotificationAction, NotificationCenter, NotificationClick,
    NotificationLog, NotificationOptions, PushPayload,
};
pub use store_policy::StorePolicy;
pub use worker::{FetchResponse, OfflineWorker, OfflineWorkerBuilder, ResponseSource};

/// Errors that can occur in worker operations.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid store rule: {0}")]
    InvalidRule(#[from] regex::Error),

    #[error("Precache failed for {url}: {reason}")]
    Install { url: String, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] NetError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Offline and no fallback cached for {0}")]
    Offline(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Malformed push payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<WorkerError> for swr_common::SwrError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Network(_) | WorkerError::Offline(_) => {
                swr_common::SwrError::network_with_source("request failed", err)
            }
            WorkerError::Install { .. } => {
                swr_common::SwrError::install_with_source("install aborted", err)
            }
            WorkerError::Config(_) | WorkerError::InvalidRule(_) => {
                swr_common::SwrError::config_with_source("invalid worker config", err)
            }
            WorkerError::Cache(_) => swr_common::SwrError::cache_with_source("cache failed", err),
            other => swr_common::SwrError::Internal(other.to_string()),
        }
    }
}
