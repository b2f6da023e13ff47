//! Block ranges and keyspace positions

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Lifecycle of a tracked interval
///
/// An interval that is not tracked by any set is unclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalStatus {
    /// Handed to a worker for brute forcing
    Processing,
    /// Reserved for building a lookup table
    Caching,
    /// Covered by a finished lookup table, never handed out as work
    Cached,
    /// Searched without a match
    Complete,
}

impl fmt::Display for IntervalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalStatus::Processing => write!(f, "processing"),
            IntervalStatus::Caching => write!(f, "caching"),
            IntervalStatus::Cached => write!(f, "cached"),
            IntervalStatus::Complete => write!(f, "complete"),
        }
    }
}

/// A block number at a given string length
///
/// Ordered by string length first, then block, which is the order the
/// allocation cursor walks the keyspace in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPoint {
    pub string_length: u32,
    pub block: i64,
}

impl BlockPoint {
    pub fn new(string_length: u32, block: i64) -> Self {
        Self {
            string_length,
            block,
        }
    }
}

impl fmt::Display for BlockPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.string_length, self.block)
    }
}

/// Half-open range of blocks `[start, end)` at one string length
///
/// Identity is `(string_length, start, end)`; the status only records which
/// lane the range is tracked in and is ignored by equality, ordering and
/// hashing. Intervals decoded from worker messages never carry a status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Interval {
    pub string_length: u32,
    pub start: i64,
    pub end: i64,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    status: Option<IntervalStatus>,
}

impl Interval {
    pub fn new(string_length: u32, start: i64, end: i64) -> Self {
        Self {
            string_length,
            start,
            end,
            status: None,
        }
    }

    /// Copy of this interval carrying `status`
    pub fn with_status(mut self, status: IntervalStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status(&self) -> Option<IntervalStatus> {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: IntervalStatus) {
        self.status = Some(status);
    }

    pub fn start_point(&self) -> BlockPoint {
        BlockPoint::new(self.string_length, self.start)
    }

    /// Number of blocks covered
    pub fn block_count(&self) -> i64 {
        self.end - self.start
    }

    pub fn contains(&self, point: BlockPoint) -> bool {
        self.string_length == point.string_length && self.start <= point.block && point.block < self.end
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.string_length == other.string_length && self.start < other.end && other.start < self.end
    }

    fn key(&self) -> (u32, i64, i64) {
        (self.string_length, self.start, self.end)
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Interval {}

impl Hash for Interval {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "len {} blocks [{}, {})", self.string_length, self.start, self.end)?;
        if let Some(status) = self.status {
            write!(f, " {}", status)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_status() {
        let plain = Interval::new(3, 0, 10);
        let tracked = plain.with_status(IntervalStatus::Processing);
        assert_eq!(plain, tracked);
        assert_ne!(plain, Interval::new(3, 0, 11));
    }

    #[test]
    fn test_ordering_by_length_then_start() {
        let mut intervals = vec![
            Interval::new(2, 5, 6),
            Interval::new(1, 0, 1),
            Interval::new(2, 0, 5),
        ];
        intervals.sort();
        assert_eq!(
            intervals,
            vec![Interval::new(1, 0, 1), Interval::new(2, 0, 5), Interval::new(2, 5, 6)]
        );
        assert!(BlockPoint::new(1, 1000) < BlockPoint::new(2, 0));
    }

    #[test]
    fn test_overlap_is_per_length() {
        let a = Interval::new(4, 10, 20);
        assert!(a.overlaps(&Interval::new(4, 19, 30)));
        assert!(!a.overlaps(&Interval::new(4, 20, 30)));
        assert!(!a.overlaps(&Interval::new(5, 10, 20)));
        assert!(a.contains(BlockPoint::new(4, 10)));
        assert!(!a.contains(BlockPoint::new(4, 20)));
    }

    #[test]
    fn test_status_not_read_from_wire() {
        let json = r#"{"string_length":2,"start":0,"end":7,"status":"cached"}"#;
        let interval: Interval = serde_json::from_str(json).unwrap();
        assert_eq!(interval.status(), None);
        assert_eq!(interval, Interval::new(2, 0, 7));

        let encoded = serde_json::to_value(Interval::new(2, 0, 7)).unwrap();
        assert!(encoded.get("status").is_none());
    }
}
