//! rainbow-scheduler: Distributed keyspace search scheduler
//!
//! Hands block ranges of the keyspace to connected workers over WebSocket
//! and exposes an HTTP interface for starting, stopping and inspecting
//! queries. All scheduling state lives in a single dispatcher task fed by
//! an event queue.

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod transport;
pub mod worker;

pub use dispatcher::{Dispatcher, DispatcherState, QueryOutcome, StatusSnapshot, WorkerStatus};
pub use error::ServerError;
pub use event::{DispatcherHandle, Event};
pub use routes::{create_router, AppState};
pub use server::{SchedulerServer, ServerBuilder, DEFAULT_EVENT_CAPACITY};
pub use worker::WorkerHandle;
