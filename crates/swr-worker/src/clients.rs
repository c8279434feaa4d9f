//! Pages the worker can see and control.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::WorkerError;

/// A client (open page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Current URL.
    pub url: Url,

    pub client_type: ClientType,

    /// Whether focused.
    pub focused: bool,

    /// Whether the active worker controls this page.
    pub controlled: bool,
}

/// Client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
    All,
}

/// Options for [`ClientHost::match_all`].
#[derive(Debug, Clone, Default)]
pub struct ClientMatchOptions {
    pub include_uncontrolled: bool,
    pub client_type: ClientType,
}

/// The host's view of open pages.
#[async_trait]
pub trait ClientHost: Send + Sync {
    async fn match_all(&self, options: ClientMatchOptions) -> Vec<Client>;

    async fn navigate(&self, id: &str, url: &Url) -> Result<Client, WorkerError>;

    async fn focus(&self, id: &str) -> Result<Client, WorkerError>;

    async fn open_window(&self, url: &Url) -> Result<Client, WorkerError>;

    /// Take control of every open page. Returns how many were claimed.
    async fn claim(&self) -> Result<usize, WorkerError>;
}

/// In-memory [`ClientHost`].
#[derive(Debug, Clone, Default)]
pub struct WindowClients {
    clients: Arc<RwLock<HashMap<String, Client>>>,
}

impl WindowClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already open page.
    pub async fn add(&self, url: Url, client_type: ClientType) -> Client {
        let client = Client {
            id: next_client_id(),
            url,
            client_type,
            focused: false,
            controlled: false,
        };
        self.clients
            .write()
            .await
            .insert(client.id.clone(), client.clone());
        client
    }

    pub async fn get(&self, id: &str) -> Option<Client> {
        self.clients.read().await.get(id).cloned()
    }
}

#[async_trait]
impl ClientHost for WindowClients {
    async fn match_all(&self, options: ClientMatchOptions) -> Vec<Client> {
        let clients = self.clients.read().await;
        let mut matched: Vec<Client> = clients
            .values()
            .filter(|c| options.include_uncontrolled || c.controlled)
            .filter(|c| match options.client_type {
                ClientType::All => true,
                t => c.client_type == t,
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        matched
    }

    async fn navigate(&self, id: &str, url: &Url) -> Result<Client, WorkerError> {
        let mut clients = self.clients.write().await;
        let client = clients
            .get_mut(id)
            .ok_or_else(|| WorkerError::Client(format!("no client {}", id)))?;
        if client.client_type != ClientType::Window {
            return Err(WorkerError::Client(
                "Can only navigate window clients".to_string(),
            ));
        }
        debug!(client = id, url = %url, "Navigating client");
        client.url = url.clone();
        Ok(client.clone())
    }

    async fn focus(&self, id: &str) -> Result<Client, WorkerError> {
        let mut clients = self.clients.write().await;
        let window = clients
            .get(id)
            .map(|c| c.client_type == ClientType::Window)
            .ok_or_else(|| WorkerError::Client(format!("no client {}", id)))?;
        if !window {
            return Err(WorkerError::Client(
                "Can only focus window clients".to_string(),
            ));
        }
        for client in clients.values_mut() {
            client.focused = client.id == id;
        }
        clients
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::Client(format!("no client {}", id)))
    }

    async fn open_window(&self, url: &Url) -> Result<Client, WorkerError> {
        let mut clients = self.clients.write().await;
        for client in clients.values_mut() {
            client.focused = false;
        }
        let client = Client {
            id: next_client_id(),
            url: url.clone(),
            client_type: ClientType::Window,
            focused: true,
            controlled: false,
        };
        debug!(client = %client.id, url = %url, "Opened window");
        clients.insert(client.id.clone(), client.clone());
        Ok(client)
    }

    async fn claim(&self) -> Result<usize, WorkerError> {
        let mut clients = self.clients.write().await;
        for client in clients.values_mut() {
            client.controlled = true;
        }
        Ok(clients.len())
    }
}

fn next_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("client-{:06}", COUNTER.fetch_add(1, Ordering::Relaxed))
}
