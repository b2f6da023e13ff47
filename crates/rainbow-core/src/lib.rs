//! rainbow-core: Keyspace indexing and partition allocation
//!
//! This crate holds everything the scheduler needs to split an exhaustive
//! plaintext search into collision-free work units:
//! - Keyspace indexing: all strings over an alphabet up to a maximum length,
//!   split per length into fixed-size blocks
//! - Partition allocation: a forward cursor plus ordered sets of disjoint
//!   block ranges for work in flight and for the caching lane
//! - Query and protocol types shared with workers
//!
//! # Keyspace layout
//!
//! | Level | Unit | Example (a-z, block size 100) |
//! |-------|------|-------------------------------|
//! | String length | `1..=max_string_length` | length 3 = `aaa..zzz` |
//! | Block | `block_size` consecutive plaintexts | 176 blocks at length 3 |
//! | Interval | `[start, end)` of blocks at one length | `[0, 100)` at length 3 |
//!
//! The last block of every length is truncated to whatever remains.
//!
//! ## Allocation guarantees
//!
//! - Intervals handed out as work never overlap each other
//! - Cached ranges are never handed out as work
//! - Failed work is reissued exactly once the cursor comes back around
//!
//! Block counts must fit in a signed 64-bit integer. Configurations whose
//! largest length overflows are rejected when the allocator is built.

mod alphabet;
mod config;
mod error;
mod interval;
mod interval_set;
mod keyspace;
mod partition;
mod protocol;
mod query;

pub use alphabet::{Alphabet, CharClass};
pub use config::{
    SearchConfig, DEFAULT_ALPHABET, DEFAULT_MAX_STRING_LENGTH, DEFAULT_MESSAGES_BUFFERED,
    DEFAULT_WORK_SIZE,
};
pub use error::Error;
pub use interval::{BlockPoint, Interval, IntervalStatus};
pub use interval_set::IntervalSet;
pub use keyspace::{BlockTexts, KeySpace, DEFAULT_BLOCK_SIZE, MAX_STRING_LENGTH};
pub use partition::{PartitionManager, PartitionStats};
pub use protocol::{SchedulerMessage, WorkerId, WorkerMessage};
pub use query::{HashMethod, Query, QueryId, QueryIssuer};

pub type Result<T> = std::result::Result<T, Error>;
