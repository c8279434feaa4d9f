//! Worker versions and the registration that tracks them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::WorkerError;

/// Unique identifier for a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerState {
    /// Created, install not started.
    #[default]
    Parsed,
    /// Precaching.
    Installing,
    /// Installed but waiting for activation.
    Installed,
    /// Deleting old buckets.
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Replaced, or install failed.
    Redundant,
}

/// One version of the worker, identified by its bucket name.
#[derive(Debug, Clone)]
pub struct WorkerVersion {
    pub id: WorkerId,

    /// Bucket this version serves from.
    pub cache_name: String,

    pub state: WorkerState,

    /// Activate as soon as installed, without waiting for pages to close.
    pub skip_waiting: bool,

    /// Time of last state change.
    pub state_changed_at: Instant,
}

impl WorkerVersion {
    pub fn new(cache_name: &str) -> Self {
        Self {
            id: WorkerId::new(),
            cache_name: cache_name.to_string(),
            state: WorkerState::Parsed,
            skip_waiting: false,
            state_changed_at: Instant::now(),
        }
    }

    pub fn set_state(&mut self, state: WorkerState) {
        self.state = state;
        self.state_changed_at = Instant::now();
    }

    pub fn is_active(&self) -> bool {
        self.state == WorkerState::Activated
    }
}

/// Lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    StateChange {
        cache_name: String,
        new_state: WorkerState,
    },
    /// An obsolete bucket was deleted on activation.
    CacheDeleted { cache_name: String },
    /// Open pages are now controlled by this version.
    ControllerChange { cache_name: String, clients: usize },
}

/// Registration shared by every version of the worker.
pub type SharedRegistration = Arc<RwLock<Registration>>;

/// The installing / waiting / active slots for one scope.
#[derive(Debug)]
pub struct Registration {
    pub installing: Option<WorkerVersion>,
    pub waiting: Option<WorkerVersion>,
    pub active: Option<WorkerVersion>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl Registration {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                installing: None,
                waiting: None,
                active: None,
                event_tx,
            },
            event_rx,
        )
    }

    /// Create a registration behind a shared lock.
    pub fn shared() -> (SharedRegistration, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (registration, rx) = Self::new();
        (Arc::new(RwLock::new(registration)), rx)
    }

    /// Mark `cache_name` as the active version without going through
    /// install, for a host restarting with buckets it already populated.
    pub fn resume(&mut self, cache_name: &str) {
        let mut worker = WorkerVersion::new(cache_name);
        worker.set_state(WorkerState::Activated);
        self.announce(&worker);
        self.active = Some(worker);
    }

    /// Bucket name of the active version.
    pub fn active_cache(&self) -> Option<&str> {
        self.active.as_ref().map(|w| w.cache_name.as_str())
    }

    /// Whether `cache_name` is the version currently serving.
    pub fn is_active(&self, cache_name: &str) -> bool {
        self.active_cache() == Some(cache_name)
    }

    pub fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn announce(&self, worker: &WorkerVersion) {
        debug!(cache = %worker.cache_name, state = ?worker.state, "Worker state changed");
        self.emit(WorkerEvent::StateChange {
            cache_name: worker.cache_name.clone(),
            new_state: worker.state,
        });
    }

    /// Start installing a new version.
    pub fn begin_install(&mut self, cache_name: &str) {
        if let Some(mut previous) = self.installing.take() {
            previous.set_state(WorkerState::Redundant);
            self.announce(&previous);
        }
        let mut worker = WorkerVersion::new(cache_name);
        worker.set_state(WorkerState::Installing);
        self.announce(&worker);
        self.installing = Some(worker);
    }

    /// Transition installing to waiting.
    pub fn install_complete(&mut self, skip_waiting: bool) -> Result<(), WorkerError> {
        let mut worker = self
            .installing
            .take()
            .ok_or_else(|| WorkerError::State("no worker is installing".to_string()))?;
        worker.set_state(WorkerState::Installed);
        worker.skip_waiting = skip_waiting;
        self.announce(&worker);

        if let Some(mut replaced) = self.waiting.replace(worker) {
            replaced.set_state(WorkerState::Redundant);
            self.announce(&replaced);
        }
        Ok(())
    }

    /// Drop the installing version after a failed install. The active
    /// version is untouched.
    pub fn install_failed(&mut self) {
        if let Some(mut worker) = self.installing.take() {
            worker.set_state(WorkerState::Redundant);
            self.announce(&worker);
        }
    }

    /// Whether the waiting version may activate now: it asked to skip
    /// waiting, or nothing is active yet.
    pub fn ready_to_activate(&self) -> bool {
        self.waiting
            .as_ref()
            .is_some_and(|w| w.skip_waiting || self.active.is_none())
    }

    /// Promote the waiting version. The previous active version becomes
    /// redundant. Returns the bucket name of the new active version.
    pub fn activate(&mut self) -> Result<String, WorkerError> {
        let mut worker = self
            .waiting
            .take()
            .ok_or_else(|| WorkerError::State("no worker is waiting".to_string()))?;
        worker.set_state(WorkerState::Activating);
        self.announce(&worker);

        if let Some(mut old) = self.active.take() {
            old.set_state(WorkerState::Redundant);
            self.announce(&old);
        }

        worker.set_state(WorkerState::Activated);
        self.announce(&worker);
        let cache_name = worker.cache_name.clone();
        self.active = Some(worker);
        Ok(cache_name)
    }
}
