//! Scheduler-side view of one connected worker

use std::collections::BTreeSet;

use rainbow_core::{Interval, Query, QueryId, SchedulerMessage, WorkerId};
use tokio::sync::mpsc;

/// Channel feeding a worker connection's writer task
pub type Outbound = mpsc::UnboundedSender<SchedulerMessage>;

/// Connection handle plus the intervals the worker currently holds
///
/// `assigned` mirrors every work interval sent for `assigned_query` and
/// not yet reported back, so a disconnect can hand each one back to the
/// allocator. Intervals still outstanding when a new query starts move to
/// `stale`, where late reports for them are absorbed.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    outbound: Outbound,
    current_query: Option<Query>,
    assigned_query: Option<QueryId>,
    assigned: BTreeSet<Interval>,
    stale: BTreeSet<Interval>,
    caching: BTreeSet<Interval>,
}

impl WorkerHandle {
    pub fn new(id: WorkerId, outbound: Outbound) -> Self {
        Self {
            id,
            outbound,
            current_query: None,
            assigned_query: None,
            assigned: BTreeSet::new(),
            stale: BTreeSet::new(),
            caching: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Queue a message for the connection
    ///
    /// A closed connection is only logged; its disconnect event follows.
    pub fn send(&self, message: SchedulerMessage) {
        if self.outbound.send(message).is_err() {
            tracing::warn!(worker_id = self.id, "Worker connection closed, dropping message");
        }
    }

    pub fn current_query(&self) -> Option<&Query> {
        self.current_query.as_ref()
    }

    pub fn send_query(&mut self, query: &Query) {
        self.send(SchedulerMessage::new_query(query));
        self.current_query = Some(query.clone());
    }

    /// Tell the worker to abandon its query, if it has one
    pub fn stop_query(&mut self) {
        if let Some(query) = self.current_query.take() {
            self.send(SchedulerMessage::StopQuery { query_id: query.id });
        }
    }

    /// Record `interval` as held and send it as work for `query_id`
    pub fn assign(&mut self, query_id: QueryId, interval: Interval) {
        self.send(SchedulerMessage::work_block(&interval, query_id));
        self.assigned_query = Some(query_id);
        self.assigned.insert(interval);
    }

    /// Query the held intervals were assigned for
    pub fn assigned_query(&self) -> Option<QueryId> {
        self.assigned_query
    }

    /// Number of work intervals in flight
    pub fn in_flight(&self) -> usize {
        self.assigned.len()
    }

    pub fn assigned(&self) -> impl Iterator<Item = &Interval> {
        self.assigned.iter()
    }

    /// Remove `interval` from the held set, returning whether it was held
    pub fn take_assigned(&mut self, interval: &Interval) -> bool {
        self.assigned.remove(interval)
    }

    pub fn drain_assigned(&mut self) -> Vec<Interval> {
        std::mem::take(&mut self.assigned).into_iter().collect()
    }

    /// Move every held interval to the stale set ahead of a new query
    pub fn retire_assigned(&mut self) {
        let retired = std::mem::take(&mut self.assigned);
        self.stale.extend(retired);
        self.assigned_query = None;
    }

    /// Remove `interval` from the stale set, returning whether it was there
    pub fn take_stale(&mut self, interval: &Interval) -> bool {
        self.stale.remove(interval)
    }

    pub fn clear_stale(&mut self) {
        self.stale.clear();
    }

    pub fn add_caching(&mut self, interval: Interval) {
        self.caching.insert(interval);
    }

    pub fn take_caching(&mut self, interval: &Interval) -> bool {
        self.caching.remove(interval)
    }

    pub fn caching(&self) -> impl Iterator<Item = &Interval> {
        self.caching.iter()
    }

    pub fn drain_caching(&mut self) -> Vec<Interval> {
        std::mem::take(&mut self.caching).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rainbow_core::HashMethod;

    fn query(id: QueryId) -> Query {
        Query {
            id,
            target: "098f6bcd4621d373cade4e832627b4f6".to_string(),
            method: HashMethod::Md5,
        }
    }

    #[test]
    fn test_stop_query_only_when_running() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut worker = WorkerHandle::new(1, tx);

        worker.stop_query();
        assert!(rx.try_recv().is_err());

        worker.send_query(&query(4));
        assert!(matches!(rx.try_recv(), Ok(SchedulerMessage::NewQuery { query_id: 4, .. })));
        worker.stop_query();
        assert_eq!(rx.try_recv().unwrap(), SchedulerMessage::StopQuery { query_id: 4 });
        assert!(worker.current_query().is_none());
    }

    #[test]
    fn test_assign_tracks_intervals() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut worker = WorkerHandle::new(1, tx);

        worker.assign(0, Interval::new(3, 0, 2));
        worker.assign(0, Interval::new(3, 2, 4));
        assert_eq!(worker.in_flight(), 2);
        assert_eq!(
            rx.try_recv().unwrap(),
            SchedulerMessage::work_block(&Interval::new(3, 0, 2), 0)
        );

        assert!(worker.take_assigned(&Interval::new(3, 0, 2)));
        assert!(!worker.take_assigned(&Interval::new(3, 0, 2)));
        assert_eq!(worker.drain_assigned(), vec![Interval::new(3, 2, 4)]);
        assert_eq!(worker.in_flight(), 0);
    }

    #[test]
    fn test_retired_intervals_become_stale() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut worker = WorkerHandle::new(1, tx);

        worker.assign(0, Interval::new(1, 0, 1));
        worker.assign(0, Interval::new(2, 0, 2));
        assert_eq!(worker.assigned_query(), Some(0));

        worker.retire_assigned();
        assert_eq!(worker.in_flight(), 0);
        assert_eq!(worker.assigned_query(), None);

        worker.assign(1, Interval::new(1, 0, 1));
        assert_eq!(worker.assigned_query(), Some(1));
        assert!(worker.take_stale(&Interval::new(1, 0, 1)));
        assert!(!worker.take_stale(&Interval::new(1, 0, 1)));
        // The new assignment of the same range is untouched
        assert_eq!(worker.in_flight(), 1);

        worker.clear_stale();
        assert!(!worker.take_stale(&Interval::new(2, 0, 2)));
    }

    #[test]
    fn test_send_to_closed_connection_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut worker = WorkerHandle::new(9, tx);
        worker.assign(0, Interval::new(1, 0, 1));
        assert_eq!(worker.in_flight(), 1);
    }
}
