//! Error types for rainbow-core

use thiserror::Error;

use crate::Interval;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid alphabet: {0}")]
    InvalidAlphabet(String),

    #[error("Keyspace overflow: {alphabet_len}^{string_length} plaintexts do not fit in a signed 64-bit integer")]
    Overflow { alphabet_len: usize, string_length: u32 },

    #[error("Index out of bounds: {index} >= {max}")]
    IndexOutOfBounds { index: i64, max: i64 },

    #[error("Interval was never issued: {0}")]
    UnknownInterval(Interval),

    #[error("Invalid interval {interval}: {reason}")]
    InvalidInterval { interval: Interval, reason: String },

    #[error("Interval {requested} overlaps existing claim {existing}")]
    OverlappingInterval { requested: Interval, existing: Interval },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
