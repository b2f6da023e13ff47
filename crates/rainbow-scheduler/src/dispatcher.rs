//! Single-owner scheduling loop
//!
//! The dispatcher owns the partition manager, the query issuer and every
//! worker handle. It runs as one task draining an event queue, so all
//! allocation, completion and failure handling happens in a single
//! sequence without locks.
//!
//! Per worker it keeps up to `messages_buffered` work intervals in flight:
//! - on connect the worker is bootstrapped and, if a query is running, sent
//!   the query and a full buffer of work
//! - each completion refills the buffer
//! - on disconnect everything the worker held goes back to the allocator
//!   and the remaining workers are topped up

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::time::Instant;

use rainbow_core::{
    BlockPoint, HashMethod, Interval, PartitionManager, PartitionStats, Query, QueryId,
    QueryIssuer, SchedulerMessage, SearchConfig, WorkerId, WorkerMessage,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::{DispatcherHandle, Event};
use crate::metrics;
use crate::worker::{Outbound, WorkerHandle};

/// How a query ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    Found { query_id: QueryId, plaintext: String },
    /// Every plaintext up to the maximum length was searched
    Exhausted { query_id: QueryId },
    Stopped { query_id: QueryId },
}

impl QueryOutcome {
    pub fn query_id(&self) -> QueryId {
        match self {
            QueryOutcome::Found { query_id, .. }
            | QueryOutcome::Exhausted { query_id }
            | QueryOutcome::Stopped { query_id } => *query_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QueryOutcome::Found { .. } => metrics::OUTCOME_FOUND,
            QueryOutcome::Exhausted { .. } => metrics::OUTCOME_EXHAUSTED,
            QueryOutcome::Stopped { .. } => metrics::OUTCOME_STOPPED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub worker_id: WorkerId,
    /// Query the worker is searching, `None` once told to stop
    pub query_id: Option<QueryId>,
    /// Work intervals in flight
    pub assigned: usize,
    /// Cache reservations held
    pub caching: usize,
}

/// Point-in-time view of the dispatcher, served by `GET /status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: DispatcherState,
    pub query: Option<Query>,
    pub last_outcome: Option<QueryOutcome>,
    /// Query ids handed out so far
    pub queries_issued: u64,
    pub workers: Vec<WorkerStatus>,
    pub cursor: BlockPoint,
    pub partitions: PartitionStats,
}

#[derive(Debug)]
struct ActiveQuery {
    query: Query,
    started: Instant,
}

pub struct Dispatcher {
    partitions: PartitionManager,
    work_size: u32,
    messages_buffered: usize,
    workers: BTreeMap<WorkerId, WorkerHandle>,
    issuer: QueryIssuer,
    active: Option<ActiveQuery>,
    last_outcome: Option<QueryOutcome>,
}

impl Dispatcher {
    pub fn new(config: &SearchConfig) -> rainbow_core::Result<Self> {
        Ok(Self {
            partitions: config.partition_manager()?,
            work_size: config.work_size,
            messages_buffered: config.messages_buffered,
            workers: BTreeMap::new(),
            issuer: QueryIssuer::new(),
            active: None,
            last_outcome: None,
        })
    }

    /// Run on a new task with an event queue of `capacity`
    pub fn spawn(self, capacity: usize) -> (DispatcherHandle, JoinHandle<()>) {
        let (events, receiver) = mpsc::channel(capacity);
        let task = tokio::spawn(self.run(receiver));
        (DispatcherHandle::new(events), task)
    }

    /// Apply events until a shutdown or until every sender is gone
    pub async fn run(mut self, mut events: mpsc::Receiver<Event>) {
        tracing::info!(
            max_string_length = self.partitions.max_string_length(),
            work_size = self.work_size,
            messages_buffered = self.messages_buffered,
            "Dispatcher started"
        );
        while let Some(event) = events.recv().await {
            if self.handle(event).is_break() {
                break;
            }
        }
        tracing::info!("Dispatcher stopped");
    }

    pub fn handle(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::WorkerConnected {
                worker_id,
                outbound,
            } => self.worker_connected(worker_id, outbound),
            Event::WorkerDisconnected { worker_id } => self.worker_disconnected(worker_id),
            Event::WorkerMessage { worker_id, message } => self.worker_message(worker_id, message),
            Event::RequestQuery {
                target,
                method,
                reply,
            } => {
                let result = self.request_query(&target, method);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Event::StopQuery => self.stop_query(),
            Event::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Event::Shutdown => {
                if let Some(query_id) = self.active_query_id() {
                    self.finish(QueryOutcome::Stopped { query_id });
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Start searching for `target`, replacing any running query
    ///
    /// All work state is reset; cache reservations survive. Intervals the
    /// workers still hold become stale so their late reports are not
    /// counted against the new query. An invalid target leaves the
    /// dispatcher untouched.
    pub fn request_query(&mut self, target: &str, method: HashMethod) -> rainbow_core::Result<Query> {
        let query = match self.issuer.issue(target, method) {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected query");
                return Err(e);
            }
        };

        if let Some(query_id) = self.active_query_id() {
            self.finish(QueryOutcome::Stopped { query_id });
        }

        self.partitions.reset();
        for worker in self.workers.values_mut() {
            worker.retire_assigned();
        }

        tracing::info!(
            query_id = query.id,
            target = %query.target,
            method = %query.method,
            workers = self.workers.len(),
            "Starting query"
        );
        self.active = Some(ActiveQuery {
            query: query.clone(),
            started: Instant::now(),
        });

        let ids: Vec<WorkerId> = self.workers.keys().copied().collect();
        for worker_id in ids {
            self.start_worker(worker_id);
        }
        Ok(query)
    }

    pub fn stop_query(&mut self) {
        match self.active_query_id() {
            Some(query_id) => self.finish(QueryOutcome::Stopped { query_id }),
            None => tracing::debug!("Stop requested with no query running"),
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: if self.active.is_some() {
                DispatcherState::Running
            } else {
                DispatcherState::Idle
            },
            query: self.active.as_ref().map(|active| active.query.clone()),
            last_outcome: self.last_outcome.clone(),
            queries_issued: self.issuer.issued(),
            workers: self
                .workers
                .values()
                .map(|worker| WorkerStatus {
                    worker_id: worker.id(),
                    query_id: worker.current_query().map(|query| query.id),
                    assigned: worker.in_flight(),
                    caching: worker.caching().count(),
                })
                .collect(),
            cursor: self.partitions.cursor(),
            partitions: self.partitions.stats(),
        }
    }

    pub fn partitions(&self) -> &PartitionManager {
        &self.partitions
    }

    pub fn worker_connected(&mut self, worker_id: WorkerId, outbound: Outbound) {
        let worker = WorkerHandle::new(worker_id, outbound);
        worker.send(SchedulerMessage::Bootstrap { worker_id });
        self.workers.insert(worker_id, worker);

        tracing::info!(worker_id, workers = self.workers.len(), "Worker connected");
        metrics::set_workers_connected(self.workers.len());
        self.start_worker(worker_id);
    }

    pub fn worker_disconnected(&mut self, worker_id: WorkerId) {
        let Some(mut worker) = self.workers.remove(&worker_id) else {
            tracing::debug!(worker_id, "Disconnect for unknown worker");
            return;
        };

        let held = worker.drain_assigned();
        for interval in &held {
            if self.partitions.notify_failure(interval) {
                metrics::record_partition_failed();
            }
        }
        // Only reservations still pending; a range another worker finished stays cached
        for interval in worker.drain_caching() {
            if self.partitions.caching().contains(&interval) {
                self.partitions.release_cache(&interval);
            }
        }

        tracing::info!(
            worker_id,
            requeued = held.len(),
            workers = self.workers.len(),
            "Worker disconnected"
        );
        metrics::set_workers_connected(self.workers.len());

        let ids: Vec<WorkerId> = self.workers.keys().copied().collect();
        for other in ids {
            self.top_up(other);
        }
        self.check_exhausted();
    }

    pub fn worker_message(&mut self, worker_id: WorkerId, message: WorkerMessage) {
        if !self.workers.contains_key(&worker_id) {
            tracing::warn!(worker_id, "Message from unknown worker");
            return;
        }
        match message {
            WorkerMessage::WorkBlockComplete { interval, query_id } => {
                self.work_complete(worker_id, interval, query_id)
            }
            WorkerMessage::QueryFound {
                query_id,
                plaintext,
            } => self.query_found(worker_id, query_id, plaintext),
            WorkerMessage::CacheRequest { size } => self.cache_request(worker_id, size),
            WorkerMessage::CacheReady(interval) => self.cache_ready(worker_id, interval),
            WorkerMessage::CacheRelease(interval) => self.cache_release(worker_id, interval),
        }
    }

    fn work_complete(&mut self, worker_id: WorkerId, interval: Interval, query_id: Option<QueryId>) {
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            return;
        };
        match query_id {
            Some(query_id) if worker.assigned_query() != Some(query_id) => {
                worker.take_stale(&interval);
                tracing::debug!(worker_id, query_id, %interval, "Completion for a previous query");
                return;
            }
            Some(_) => worker.clear_stale(),
            // Untagged reports arrive in order, so old ranges are answered first
            None if worker.take_stale(&interval) => {
                tracing::debug!(worker_id, %interval, "Completion for a previous query");
                return;
            }
            None => {}
        }

        if !worker.take_assigned(&interval) {
            tracing::warn!(worker_id, %interval, "Completion for interval not assigned to worker");
            return;
        }

        match self.partitions.notify_complete(&interval) {
            Ok(()) => metrics::record_partition_completed(),
            Err(e) => tracing::warn!(worker_id, error = %e, "Completion rejected"),
        }
        tracing::debug!(worker_id, %interval, "Interval complete");

        self.top_up(worker_id);
        self.check_exhausted();
    }

    fn query_found(&mut self, worker_id: WorkerId, query_id: QueryId, plaintext: String) {
        if self.active_query_id() != Some(query_id) {
            tracing::warn!(worker_id, query_id, "Result for a query that is not running");
            return;
        }
        tracing::info!(worker_id, query_id, plaintext = %plaintext, "Plaintext found");
        self.finish(QueryOutcome::Found {
            query_id,
            plaintext,
        });
    }

    fn cache_request(&mut self, worker_id: WorkerId, size: Option<u32>) {
        let interval = self.partitions.request_cache(size.unwrap_or(self.work_size));
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            return;
        };
        if let Some(interval) = interval {
            worker.add_caching(interval);
            tracing::info!(worker_id, %interval, "Cache range reserved");
        } else {
            tracing::info!(worker_id, "No cache range left to reserve");
        }
        worker.send(SchedulerMessage::CacheAssignment {
            interval: interval.map(|i| Interval::new(i.string_length, i.start, i.end)),
        });
    }

    fn cache_ready(&mut self, worker_id: WorkerId, interval: Interval) {
        match self.partitions.notify_cache(&interval) {
            Ok(()) => {
                for worker in self.workers.values_mut() {
                    worker.take_caching(&interval);
                }
                tracing::info!(worker_id, %interval, "Cache range ready");
            }
            Err(e) => tracing::warn!(worker_id, error = %e, "Cache registration rejected"),
        }
    }

    fn cache_release(&mut self, worker_id: WorkerId, interval: Interval) {
        for worker in self.workers.values_mut() {
            worker.take_caching(&interval);
        }
        if self.partitions.release_cache(&interval) {
            tracing::info!(worker_id, %interval, "Cache range released");
        } else {
            tracing::warn!(worker_id, %interval, "Release for unknown cache range");
        }
    }

    fn active_query_id(&self) -> Option<QueryId> {
        self.active.as_ref().map(|active| active.query.id)
    }

    /// Send the running query and a full buffer of work to one worker
    fn start_worker(&mut self, worker_id: WorkerId) {
        let Some(active) = &self.active else {
            return;
        };
        let query = active.query.clone();
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.send_query(&query);
        }
        self.top_up(worker_id);
    }

    /// Fill a worker's buffer up to `messages_buffered` intervals
    fn top_up(&mut self, worker_id: WorkerId) {
        let Some(query_id) = self.active_query_id() else {
            return;
        };
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            return;
        };

        let wanted = self.messages_buffered.saturating_sub(worker.in_flight());
        if wanted == 0 {
            return;
        }
        let intervals = self.partitions.request_partitions(self.work_size, wanted);
        metrics::record_partitions_issued(intervals.len());
        for interval in intervals {
            worker.assign(query_id, interval);
        }
    }

    /// Finish the running query once nothing is left to hand out or wait on
    fn check_exhausted(&mut self) {
        let Some(query_id) = self.active_query_id() else {
            return;
        };
        if self.partitions.is_exhausted() && self.workers.values().all(|w| w.in_flight() == 0) {
            self.finish(QueryOutcome::Exhausted { query_id });
        }
    }

    fn finish(&mut self, outcome: QueryOutcome) {
        let Some(active) = self.active.take() else {
            return;
        };
        for worker in self.workers.values_mut() {
            worker.stop_query();
        }

        let elapsed = active.started.elapsed();
        tracing::info!(
            query_id = active.query.id,
            outcome = outcome.label(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Query finished"
        );
        metrics::record_query(outcome.label(), elapsed);
        self.last_outcome = Some(outcome);
    }
}
