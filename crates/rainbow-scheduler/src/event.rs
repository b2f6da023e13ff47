//! Events consumed by the dispatcher and the handle used to send them

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rainbow_core::{HashMethod, Query, WorkerId, WorkerMessage};
use tokio::sync::{mpsc, oneshot};

use crate::dispatcher::StatusSnapshot;
use crate::error::{Result, ServerError};
use crate::worker::Outbound;

/// Everything that can change dispatcher state
///
/// Connection tasks and HTTP handlers never touch scheduling state
/// directly; they enqueue one of these and the dispatcher applies them in
/// arrival order.
#[derive(Debug)]
pub enum Event {
    WorkerConnected {
        worker_id: WorkerId,
        outbound: Outbound,
    },
    WorkerDisconnected {
        worker_id: WorkerId,
    },
    WorkerMessage {
        worker_id: WorkerId,
        message: WorkerMessage,
    },
    RequestQuery {
        target: String,
        method: HashMethod,
        reply: Option<oneshot::Sender<rainbow_core::Result<Query>>>,
    },
    StopQuery,
    Status(oneshot::Sender<StatusSnapshot>),
    Shutdown,
}

/// Cloneable sender side of the dispatcher's event queue
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    events: mpsc::Sender<Event>,
    next_worker_id: Arc<AtomicU64>,
}

impl DispatcherHandle {
    pub fn new(events: mpsc::Sender<Event>) -> Self {
        Self {
            events,
            next_worker_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate an id for a new worker connection
    pub fn next_worker_id(&self) -> WorkerId {
        self.next_worker_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn send(&self, event: Event) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| ServerError::DispatcherUnavailable)
    }

    /// Start a new query, stopping the running one
    pub async fn request_query(&self, target: String, method: HashMethod) -> Result<Query> {
        let (reply, response) = oneshot::channel();
        self.send(Event::RequestQuery {
            target,
            method,
            reply: Some(reply),
        })
        .await?;
        let query = response
            .await
            .map_err(|_| ServerError::DispatcherUnavailable)??;
        Ok(query)
    }

    pub async fn stop_query(&self) -> Result<()> {
        self.send(Event::StopQuery).await
    }

    pub async fn status(&self) -> Result<StatusSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(Event::Status(reply)).await?;
        response.await.map_err(|_| ServerError::DispatcherUnavailable)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Event::Shutdown).await
    }
}
