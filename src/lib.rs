//! rainbow: distributed exhaustive keyspace search
//!
//! Umbrella crate re-exporting the allocation engine and the scheduler
//! service so integration tests can drive both through one dependency.

pub use rainbow_core;
pub use rainbow_scheduler;
