//! Background work owned by the worker.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::trace;

/// Scope for fire-and-forget work such as revalidation and cache writes.
///
/// Spawned tasks never block the response path; [`BackgroundTasks::settle`]
/// waits for everything spawned so far.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    // Serializes close/wait/reopen so one caller cannot reopen the tracker
    // while another is still waiting on it.
    settling: Arc<Mutex<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task onto the current tokio runtime.
    pub fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        trace!(task = label, pending = self.tracker.len() + 1, "Spawning background task");
        self.tracker.spawn(task);
    }

    /// Number of tasks still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until all spawned tasks have finished. Safe to call from
    /// several tasks at once.
    pub async fn settle(&self) {
        let _guard = self.settling.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
