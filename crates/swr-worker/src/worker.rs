//! The worker service object.

use std::sync::Arc;

use futures::future::join_all;
use http::StatusCode;
use swr_cache::{CacheStore, MemoryCacheStore};
use swr_net::{Fetcher, HttpFetcher, LoaderConfig, NetError, Request, Response};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::background::BackgroundTasks;
use crate::clients::{ClientHost, ClientMatchOptions, ClientType, WindowClients};
use crate::config::WorkerConfig;
use crate::dispatch::FetchDecision;
use crate::eligibility::{Eligibility, EligibilityFilter};
use crate::lifecycle::{Registration, SharedRegistration, WorkerEvent};
use crate::notification::{
    title_or_default, ClickOutcome, Notification, NotificationCenter, NotificationClick,
    NotificationLog, NotificationOptions, PushPayload, ACTION_CLOSE,
};
use crate::store_policy::StorePolicy;
use crate::WorkerError;

/// Where a response handed to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Served from the active bucket; a refresh was scheduled.
    Cache,
    /// Fetched from the network.
    Network,
    /// The cached offline document, served because the network failed.
    OfflineFallback,
}

/// A response returned to the page.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub response: Response,
    pub source: ResponseSource,
}

/// Offline caching worker for one version of the site.
///
/// Owns handles to its collaborators; there is no ambient state.
pub struct OfflineWorker {
    config: WorkerConfig,
    precache: Vec<Url>,
    offline_url: Url,
    filter: EligibilityFilter,
    store_policy: StorePolicy,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    notifications: Arc<dyn NotificationCenter>,
    clients: Arc<dyn ClientHost>,
    registration: SharedRegistration,
    background: BackgroundTasks,
}

/// Builder for [`OfflineWorker`]. Unset collaborators get in-memory
/// defaults; an unset fetcher is an [`HttpFetcher`] for the configured
/// origin.
pub struct OfflineWorkerBuilder {
    config: WorkerConfig,
    store: Option<Arc<dyn CacheStore>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    notifications: Option<Arc<dyn NotificationCenter>>,
    clients: Option<Arc<dyn ClientHost>>,
    registration: Option<SharedRegistration>,
}

impl OfflineWorkerBuilder {
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn notifications(mut self, notifications: Arc<dyn NotificationCenter>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn clients(mut self, clients: Arc<dyn ClientHost>) -> Self {
        self.clients = Some(clients);
        self
    }

    /// Share a registration with other versions of the worker.
    pub fn registration(mut self, registration: SharedRegistration) -> Self {
        self.registration = Some(registration);
        self
    }

    pub fn build(self) -> Result<OfflineWorker, WorkerError> {
        let config = self.config;
        config
            .validate()
            .map_err(|e| WorkerError::Config(e.to_string()))?;

        let precache = config
            .precache_urls()
            .map_err(|e| WorkerError::Config(e.to_string()))?;
        let offline_url = config
            .resolve(&config.offline_fallback)
            .map_err(|e| WorkerError::Config(e.to_string()))?;
        let filter = EligibilityFilter::new(config.exclusions.clone());
        let store_policy = StorePolicy::new(&config.store)?;

        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(
                config.origin.clone(),
                LoaderConfig::default(),
            )?),
        };

        Ok(OfflineWorker {
            precache,
            offline_url,
            filter,
            store_policy,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryCacheStore::new())),
            fetcher,
            notifications: self
                .notifications
                .unwrap_or_else(|| Arc::new(NotificationLog::new())),
            clients: self
                .clients
                .unwrap_or_else(|| Arc::new(WindowClients::new())),
            registration: self
                .registration
                .unwrap_or_else(|| Registration::shared().0),
            background: BackgroundTasks::new(),
            config,
        })
    }
}

impl OfflineWorker {
    pub fn builder(config: WorkerConfig) -> OfflineWorkerBuilder {
        OfflineWorkerBuilder {
            config,
            store: None,
            fetcher: None,
            notifications: None,
            clients: None,
            registration: None,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn registration(&self) -> &SharedRegistration {
        &self.registration
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    /// Wait for background revalidation and cache writes to finish.
    pub async fn settle(&self) {
        self.background.settle().await;
    }

    /// Whether this version is the one serving requests.
    pub async fn is_controlling(&self) -> bool {
        self.registration.read().await.is_active(self.cache_name())
    }

    // ==================== Lifecycle ====================

    /// Precache every asset into this version's bucket, then ask to skip
    /// waiting. Nothing is committed unless every asset fetched OK.
    pub async fn install(&self) -> Result<(), WorkerError> {
        let cache_name = self.cache_name();
        self.registration.write().await.begin_install(cache_name);
        info!(cache = %cache_name, assets = self.precache.len(), "Installing");

        match self.precache_all().await {
            Ok(()) => {
                self.registration.write().await.install_complete(true)?;
                info!(cache = %cache_name, "Installed");
                Ok(())
            }
            Err(e) => {
                warn!(cache = %cache_name, error = %e, "Install failed");
                self.registration.write().await.install_failed();
                Err(e)
            }
        }
    }

    async fn precache_all(&self) -> Result<(), WorkerError> {
        let requests: Vec<Request> = self.precache.iter().cloned().map(Request::get).collect();
        let results = join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await;

        let mut entries = Vec::with_capacity(requests.len());
        for (request, result) in requests.into_iter().zip(results) {
            let response = result.map_err(|e| WorkerError::Install {
                url: request.url.to_string(),
                reason: e.to_string(),
            })?;
            if !response.ok() {
                return Err(WorkerError::Install {
                    url: request.url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            entries.push((request, response));
        }

        self.store.put_all(self.cache_name(), &entries).await?;
        Ok(())
    }

    /// Delete every bucket but this version's, become the active version and
    /// claim all open pages. Returns the deleted bucket names.
    pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
        let cache_name = self.cache_name();
        {
            let registration = self.registration.read().await;
            let waiting = registration.waiting.as_ref().map(|w| w.cache_name.as_str());
            if waiting != Some(cache_name) {
                return Err(WorkerError::State(format!(
                    "{} is not waiting to activate",
                    cache_name
                )));
            }
        }

        let mut deleted = Vec::new();
        for name in self.store.keys().await {
            if name != cache_name && self.store.delete(&name).await {
                info!(cache = %name, "Deleted old cache");
                deleted.push(name);
            }
        }

        {
            let mut registration = self.registration.write().await;
            registration.activate()?;
            for name in &deleted {
                registration.emit(WorkerEvent::CacheDeleted {
                    cache_name: name.clone(),
                });
            }
        }

        // Claiming may wait on the host; the registration stays readable.
        let claimed = self.clients.claim().await?;
        self.registration
            .read()
            .await
            .emit(WorkerEvent::ControllerChange {
                cache_name: cache_name.to_string(),
                clients: claimed,
            });
        info!(cache = %cache_name, clients = claimed, "Activated");

        Ok(deleted)
    }

    // ==================== Fetch ====================

    /// Decide whether to intercept a request and, if so, answer it.
    pub async fn handle_fetch(&self, request: Request) -> FetchDecision {
        if !self.is_controlling().await {
            trace!(url = %request.url, "Not the active version, not intercepting");
            return FetchDecision::Passthrough;
        }

        if let Eligibility::Excluded(reason) = self.filter.check(&request) {
            trace!(url = %request.url, reason = ?reason, "Not intercepting");
            return FetchDecision::Passthrough;
        }

        match self.respond(request).await {
            Ok(response) => FetchDecision::Respond(response),
            Err(e) => FetchDecision::Failed(e),
        }
    }

    /// Stale-while-revalidate for an eligible request.
    ///
    /// Never waits on a cache write: hits schedule a background refresh and
    /// misses schedule the store.
    pub async fn respond(&self, request: Request) -> Result<FetchResponse, WorkerError> {
        if let Some(entry) = self.store.match_url(self.cache_name(), &request.url).await {
            match entry.to_response() {
                Ok(response) => {
                    debug!(url = %request.url, "Cache hit");
                    self.revalidate(request);
                    return Ok(FetchResponse {
                        response,
                        source: ResponseSource::Cache,
                    });
                }
                Err(e) => {
                    warn!(url = %request.url, error = %e, "Unreadable cache entry, using network")
                }
            }
        }

        let response = match self.fetcher.fetch(&request).await {
            Ok(response) => response,
            Err(e) => return self.offline(&request, e).await,
        };

        if !response.is_storable() {
            debug!(
                url = %request.url,
                status = %response.status,
                response_type = response.response_type.as_str(),
                "Passing response through uncached"
            );
        } else if self.store_policy.should_store(&request.url) {
            self.store_later(request, response.clone());
        } else {
            trace!(url = %request.url, "Not a cached asset type");
        }

        Ok(FetchResponse {
            response,
            source: ResponseSource::Network,
        })
    }

    async fn offline(&self, request: &Request, err: NetError) -> Result<FetchResponse, WorkerError> {
        if !request.is_navigation() {
            debug!(url = %request.url, error = %err, "Network failed for subresource");
            return Err(WorkerError::Network(err));
        }

        warn!(url = %request.url, error = %err, "Network failed, serving offline document");
        let entry = self
            .store
            .match_url(self.cache_name(), &self.offline_url)
            .await
            .ok_or_else(|| WorkerError::Offline(request.url.to_string()))?;

        Ok(FetchResponse {
            response: entry.to_response()?,
            source: ResponseSource::OfflineFallback,
        })
    }

    fn revalidate(&self, request: Request) {
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let cache_name = self.config.cache_name.clone();

        self.background.spawn("revalidate", async move {
            match fetcher.fetch(&request).await {
                Ok(response) if response.status == StatusCode::OK => {
                    match store.put(&cache_name, &request, &response).await {
                        Ok(()) => trace!(url = %request.url, "Cache entry refreshed"),
                        Err(e) => debug!(url = %request.url, error = %e, "Refresh not stored"),
                    }
                }
                Ok(response) => {
                    debug!(url = %request.url, status = %response.status, "Refresh skipped")
                }
                Err(e) => debug!(url = %request.url, error = %e, "Refresh failed"),
            }
        });
    }

    fn store_later(&self, request: Request, response: Response) {
        let store = Arc::clone(&self.store);
        let cache_name = self.config.cache_name.clone();

        self.background.spawn("store", async move {
            match store.put(&cache_name, &request, &response).await {
                Ok(()) => trace!(url = %request.url, "Stored"),
                Err(e) => debug!(url = %request.url, error = %e, "Store failed"),
            }
        });
    }

    // ==================== Push ====================

    /// Show a notification for a push message. No payload, or a payload
    /// that is not JSON, shows nothing.
    pub async fn handle_push(&self, data: Option<&[u8]>) -> Result<Option<Notification>, WorkerError> {
        let Some(data) = data else {
            debug!("Push without payload");
            return Ok(None);
        };

        let payload = match PushPayload::parse(data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed push payload");
                return Ok(None);
            }
        };

        let defaults = &self.config.notifications;
        let title = title_or_default(&payload, defaults);
        let options = NotificationOptions::from_payload(&payload, defaults);
        let notification = self.notifications.show(title, options).await?;
        info!(id = notification.id, title = %notification.title, "Notification shown");
        Ok(Some(notification))
    }

    /// Close the notification; unless dismissed, focus an open page of this
    /// origin at the target URL, or open a new one.
    pub async fn handle_notification_click(
        &self,
        click: NotificationClick,
    ) -> Result<ClickOutcome, WorkerError> {
        self.notifications.close(click.notification.id).await;

        if click.action.as_deref() == Some(ACTION_CLOSE) {
            return Ok(ClickOutcome::Dismissed);
        }

        let target = match click.notification.options.url.as_str() {
            "" => "/",
            url => url,
        };
        let target = self
            .config
            .resolve(target)
            .map_err(|e| WorkerError::Client(e.to_string()))?;

        let origin = self.config.origin.origin().ascii_serialization();
        let windows = self
            .clients
            .match_all(ClientMatchOptions {
                include_uncontrolled: true,
                client_type: ClientType::Window,
            })
            .await;

        if let Some(client) = windows.iter().find(|c| c.url.as_str().contains(&origin)) {
            self.clients.navigate(&client.id, &target).await?;
            let client = self.clients.focus(&client.id).await?;
            debug!(client = %client.id, url = %target, "Focused existing page");
            return Ok(ClickOutcome::Focused {
                client_id: client.id,
            });
        }

        let client = self.clients.open_window(&target).await?;
        debug!(client = %client.id, url = %target, "Opened new page");
        Ok(ClickOutcome::Opened {
            client_id: client.id,
        })
    }
}
