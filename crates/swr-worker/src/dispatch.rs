//! Event dispatch table.
//!
//! Each handler's future is the "wait until" work: the host may not move on
//! (finish installing, release the fetch, drop the push) until it resolves.

use async_trait::async_trait;
use bytes::Bytes;
use swr_net::Request;

use crate::notification::{ClickOutcome, Notification, NotificationClick};
use crate::worker::{FetchResponse, OfflineWorker};
use crate::WorkerError;

/// Outcome of a fetch event.
#[derive(Debug)]
pub enum FetchDecision {
    /// Not intercepted; the host performs its default network fetch.
    Passthrough,
    /// Intercepted and answered.
    Respond(FetchResponse),
    /// Intercepted, and the page sees a failed fetch.
    Failed(WorkerError),
}

/// One method per event kind.
#[async_trait]
pub trait WorkerEvents: Send + Sync {
    async fn on_install(&self) -> Result<(), WorkerError>;

    /// Returns the names of deleted buckets.
    async fn on_activate(&self) -> Result<Vec<String>, WorkerError>;

    async fn on_fetch(&self, request: Request) -> FetchDecision;

    async fn on_push(&self, data: Option<Bytes>) -> Result<Option<Notification>, WorkerError>;

    async fn on_notification_click(
        &self,
        click: NotificationClick,
    ) -> Result<ClickOutcome, WorkerError>;
}

#[async_trait]
impl WorkerEvents for OfflineWorker {
    async fn on_install(&self) -> Result<(), WorkerError> {
        self.install().await
    }

    async fn on_activate(&self) -> Result<Vec<String>, WorkerError> {
        self.activate().await
    }

    async fn on_fetch(&self, request: Request) -> FetchDecision {
        self.handle_fetch(request).await
    }

    async fn on_push(&self, data: Option<Bytes>) -> Result<Option<Notification>, WorkerError> {
        self.handle_push(data.as_deref()).await
    }

    async fn on_notification_click(
        &self,
        click: NotificationClick,
    ) -> Result<ClickOutcome, WorkerError> {
        self.handle_notification_click(click).await
    }
}

/// An event delivered by the host.
#[derive(Debug)]
pub enum PlatformEvent {
    Install,
    Activate,
    Fetch(Request),
    Push(Option<Bytes>),
    NotificationClick(NotificationClick),
}

impl PlatformEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformEvent::Install => "install",
            PlatformEvent::Activate => "activate",
            PlatformEvent::Fetch(_) => "fetch",
            PlatformEvent::Push(_) => "push",
            PlatformEvent::NotificationClick(_) => "notificationclick",
        }
    }
}

/// Result of a dispatched event.
#[derive(Debug)]
pub enum EventOutcome {
    Installed,
    Activated { deleted: Vec<String> },
    Fetch(FetchDecision),
    Pushed(Option<Notification>),
    Clicked(ClickOutcome),
}

/// Route an event to its handler and wait for it to finish.
pub async fn dispatch(
    handler: &dyn WorkerEvents,
    event: PlatformEvent,
) -> Result<EventOutcome, WorkerError> {
    tracing::debug!(event = event.kind(), "Dispatching");
    match event {
        PlatformEvent::Install => handler.on_install().await.map(|()| EventOutcome::Installed),
        PlatformEvent::Activate => handler
            .on_activate()
            .await
            .map(|deleted| EventOutcome::Activated { deleted }),
        PlatformEvent::Fetch(request) => Ok(EventOutcome::Fetch(handler.on_fetch(request).await)),
        PlatformEvent::Push(data) => handler.on_push(data).await.map(EventOutcome::Pushed),
        PlatformEvent::NotificationClick(click) => handler
            .on_notification_click(click)
            .await
            .map(EventOutcome::Clicked),
    }
}
