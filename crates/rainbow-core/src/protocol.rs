//! Messages exchanged between the scheduler and workers
//!
//! Both directions are JSON objects tagged by a `type` field:
//!
//! ```text
//! {"type":"work_block_setup","string_length":4,"start":0,"end":2,"query_id":0}
//! {"type":"work_block_complete","string_length":4,"start":0,"end":2,"query_id":0}
//! ```

use serde::{Deserialize, Serialize};

use crate::{HashMethod, Interval, Query, QueryId, Result};

/// Connection identifier assigned by the scheduler
pub type WorkerId = u64;

/// Scheduler -> worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerMessage {
    /// First message on every connection
    Bootstrap { worker_id: WorkerId },
    NewQuery {
        query_id: QueryId,
        target: String,
        method: HashMethod,
    },
    StopQuery { query_id: QueryId },
    /// Search blocks `[start, end)` of `string_length` for `query_id`
    WorkBlockSetup {
        string_length: u32,
        start: i64,
        end: i64,
        query_id: QueryId,
    },
    /// Answer to a cache request, `None` when nothing is left to reserve
    CacheAssignment { interval: Option<Interval> },
}

impl SchedulerMessage {
    pub fn new_query(query: &Query) -> Self {
        SchedulerMessage::NewQuery {
            query_id: query.id,
            target: query.target.clone(),
            method: query.method,
        }
    }

    pub fn work_block(interval: &Interval, query_id: QueryId) -> Self {
        SchedulerMessage::WorkBlockSetup {
            string_length: interval.string_length,
            start: interval.start,
            end: interval.end,
            query_id,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Worker -> scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// An assigned interval was searched without a match
    ///
    /// `query_id` names the query the range was searched for. Reports
    /// without it are matched against the worker's assignments in order.
    WorkBlockComplete {
        #[serde(flatten)]
        interval: Interval,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query_id: Option<QueryId>,
    },
    QueryFound { query_id: QueryId, plaintext: String },
    /// Ask for a range to build a lookup table for
    CacheRequest {
        #[serde(default)]
        size: Option<u32>,
    },
    /// A lookup table for the range is ready
    CacheReady(Interval),
    /// The lookup table for the range was dropped
    CacheRelease(Interval),
}

impl WorkerMessage {
    /// Completion report tagged with the query it was searched for
    pub fn work_block_complete(interval: Interval, query_id: QueryId) -> Self {
        WorkerMessage::WorkBlockComplete {
            interval,
            query_id: Some(query_id),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
