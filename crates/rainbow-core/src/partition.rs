//! Partition allocation over the keyspace
//!
//! The manager never materializes the block space. It keeps:
//! - a cursor at the lowest point not yet handed out as work
//! - `processing`: ranges handed to workers (and, once searched, marked complete)
//! - `caching`: ranges reserved while a lookup table is being built
//! - `cached`: ranges covered by finished lookup tables
//!
//! Work is carved from the cursor forward, skipping anything claimed in
//! `processing` or `cached`. Completed ranges stay in `processing` so that a
//! cursor rewound by a failure walks over them instead of reissuing them.

use serde::Serialize;

use crate::{
    BlockPoint, Error, Interval, IntervalSet, IntervalStatus, KeySpace, Result, MAX_STRING_LENGTH,
};

/// Interval counts per lane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub processing: usize,
    pub complete: usize,
    pub caching: usize,
    pub cached: usize,
}

/// Owns the allocation cursor and every tracked interval
#[derive(Debug, Clone)]
pub struct PartitionManager {
    keyspace: KeySpace,
    max_string_length: u32,
    /// Block counts for lengths `1..=max_string_length`
    block_counts: Vec<i64>,
    next_available: BlockPoint,
    processing: IntervalSet,
    caching: IntervalSet,
    cached: IntervalSet,
}

impl PartitionManager {
    /// Create a manager for strings of length `1..=max_string_length`
    ///
    /// Fails with [`Error::Overflow`] if the longest length has more blocks
    /// than an `i64` can hold, so no later allocation can overflow.
    pub fn new(keyspace: KeySpace, max_string_length: u32) -> Result<Self> {
        if max_string_length == 0 {
            return Err(Error::InvalidConfig(
                "max string length must be at least 1".to_string(),
            ));
        }
        if max_string_length > MAX_STRING_LENGTH {
            return Err(Error::InvalidConfig(format!(
                "max string length {} exceeds {}",
                max_string_length, MAX_STRING_LENGTH
            )));
        }
        let block_counts = (1..=max_string_length)
            .map(|string_length| keyspace.number_of_blocks(string_length))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            keyspace,
            max_string_length,
            block_counts,
            next_available: BlockPoint::new(1, 0),
            processing: IntervalSet::new(),
            caching: IntervalSet::new(),
            cached: IntervalSet::new(),
        })
    }

    pub fn keyspace(&self) -> &KeySpace {
        &self.keyspace
    }

    pub fn max_string_length(&self) -> u32 {
        self.max_string_length
    }

    /// Block count for a length inside the managed range
    pub fn number_of_blocks(&self, string_length: u32) -> Option<i64> {
        let slot = string_length.checked_sub(1)?;
        self.block_counts.get(slot as usize).copied()
    }

    fn blocks(&self, string_length: u32) -> i64 {
        self.block_counts[(string_length - 1) as usize]
    }

    /// Lowest point not yet handed out as work
    pub fn cursor(&self) -> BlockPoint {
        self.next_available
    }

    /// True once the cursor has moved past the longest length
    pub fn is_exhausted(&self) -> bool {
        self.next_available.string_length > self.max_string_length
    }

    pub fn processing(&self) -> &IntervalSet {
        &self.processing
    }

    pub fn caching(&self) -> &IntervalSet {
        &self.caching
    }

    pub fn cached(&self) -> &IntervalSet {
        &self.cached
    }

    pub fn stats(&self) -> PartitionStats {
        PartitionStats {
            processing: self.processing.count_with_status(IntervalStatus::Processing),
            complete: self.processing.count_with_status(IntervalStatus::Complete),
            caching: self.caching.len(),
            cached: self.cached.len(),
        }
    }

    /// Forget all work for a new search; cache reservations are kept
    pub fn reset(&mut self) {
        self.next_available = BlockPoint::new(1, 0);
        self.processing.clear();
    }

    /// Carve the next work interval of at most `size` blocks
    ///
    /// Returns `None` once every length up to the maximum has been handed
    /// out. A `size` of zero is treated as one block.
    pub fn request_partition(&mut self, size: u32) -> Option<Interval> {
        let size = i64::from(size.max(1));
        loop {
            let string_length = self.next_available.string_length;
            if string_length > self.max_string_length {
                return None;
            }
            let blocks = self.blocks(string_length);
            let claims = [&self.processing, &self.cached];

            let start = first_free(self.next_available, blocks, &claims);
            if start >= blocks {
                self.next_available = BlockPoint::new(string_length + 1, 0);
                continue;
            }

            let start = BlockPoint::new(string_length, start);
            let end = carve_end(start, size, blocks, &claims);
            let interval = Interval::new(string_length, start.block, end)
                .with_status(IntervalStatus::Processing);

            let inserted = self.processing.insert(interval);
            assert!(inserted, "carved {} over an existing claim", interval);
            self.next_available = BlockPoint::new(string_length, end);
            return Some(interval);
        }
    }

    /// Up to `count` successive work intervals, fewer if the keyspace runs out
    pub fn request_partitions(&mut self, size: u32, count: usize) -> Vec<Interval> {
        std::iter::from_fn(|| self.request_partition(size))
            .take(count)
            .collect()
    }

    /// Mark a handed-out interval as searched
    ///
    /// Fails with [`Error::UnknownInterval`] unless `interval` is currently
    /// processing, which covers duplicates and intervals lost to a failure.
    pub fn notify_complete(&mut self, interval: &Interval) -> Result<()> {
        match self.processing.get_mut(interval) {
            Some(entry) if entry.status() == Some(IntervalStatus::Processing) => {
                entry.set_status(IntervalStatus::Complete);
                Ok(())
            }
            _ => Err(Error::UnknownInterval(*interval)),
        }
    }

    /// Give a handed-out interval back after its worker went away
    ///
    /// The interval leaves `processing` and the cursor is rewound to its
    /// start if it lies behind the cursor, so the range is reissued by a
    /// later [`request_partition`](Self::request_partition). Returns false if
    /// the interval was not processing.
    pub fn notify_failure(&mut self, interval: &Interval) -> bool {
        let processing = self
            .processing
            .get(interval)
            .is_some_and(|entry| entry.status() == Some(IntervalStatus::Processing));
        if !processing {
            return false;
        }

        self.processing.remove(interval);
        let start = interval.start_point();
        if start < self.next_available {
            self.next_available = start;
        }
        true
    }

    /// Reserve a range at the longest length for lookup-table building
    ///
    /// Scans from block zero on every call, skipping `caching` and `cached`
    /// ranges. Returns `None` when the longest length is fully reserved.
    pub fn request_cache(&mut self, size: u32) -> Option<Interval> {
        let size = i64::from(size.max(1));
        let string_length = self.max_string_length;
        let blocks = self.blocks(string_length);
        let claims = [&self.caching, &self.cached];

        let start = first_free(BlockPoint::new(string_length, 0), blocks, &claims);
        if start >= blocks {
            return None;
        }

        let start = BlockPoint::new(string_length, start);
        let end = carve_end(start, size, blocks, &claims);
        let interval =
            Interval::new(string_length, start.block, end).with_status(IntervalStatus::Caching);

        let inserted = self.caching.insert(interval);
        assert!(inserted, "reserved {} over an existing claim", interval);
        Some(interval)
    }

    /// Record a finished lookup table for `interval`
    ///
    /// Moves the range from `caching` to `cached`; already cached ranges
    /// are accepted as-is. A range that was never reserved is registered
    /// directly when it is inside the keyspace and free of other claims.
    pub fn notify_cache(&mut self, interval: &Interval) -> Result<()> {
        if self.cached.contains(interval) {
            return Ok(());
        }

        if self.caching.remove(interval).is_none() {
            self.check_bounds(interval)?;
            if let Some(existing) = self
                .caching
                .overlapping(interval)
                .or_else(|| self.cached.overlapping(interval))
            {
                return Err(Error::OverlappingInterval {
                    requested: *interval,
                    existing: *existing,
                });
            }
        }

        let inserted = self.cached.insert(interval.with_status(IntervalStatus::Cached));
        assert!(inserted, "cached {} over an existing claim", interval);
        Ok(())
    }

    /// Drop a cache reservation or finished table
    ///
    /// The range can be reserved again by [`request_cache`](Self::request_cache).
    /// The work cursor only moves forward, so a released range behind it is
    /// not handed out as work until the next [`reset`](Self::reset).
    pub fn release_cache(&mut self, interval: &Interval) -> bool {
        let caching = self.caching.remove(interval).is_some();
        let cached = self.cached.remove(interval).is_some();
        caching || cached
    }

    fn check_bounds(&self, interval: &Interval) -> Result<()> {
        let invalid = |reason: String| Error::InvalidInterval {
            interval: *interval,
            reason,
        };
        let blocks = self.number_of_blocks(interval.string_length).ok_or_else(|| {
            invalid(format!(
                "string length outside 1..={}",
                self.max_string_length
            ))
        })?;
        if interval.start < 0 || interval.start >= interval.end || interval.end > blocks {
            return Err(invalid(format!("blocks must satisfy 0 <= start < end <= {}", blocks)));
        }
        Ok(())
    }
}

/// Walk `point` forward past every claim covering it
///
/// Returns the first free block, or a value `>= limit` if the rest of the
/// length is claimed.
fn first_free(mut point: BlockPoint, limit: i64, claims: &[&IntervalSet]) -> i64 {
    while point.block < limit {
        match claims.iter().find_map(|set| set.covering(point)) {
            Some(claim) => point.block = claim.end,
            None => break,
        }
    }
    point.block
}

/// End of a new interval starting at the free block `start`
///
/// Bounded by the requested size, the end of the length and the start of
/// the nearest claim ahead.
fn carve_end(start: BlockPoint, size: i64, limit: i64, claims: &[&IntervalSet]) -> i64 {
    let end = claims
        .iter()
        .filter_map(|set| set.next_after(start))
        .map(|claim| claim.start)
        .fold(start.block.saturating_add(size).min(limit), i64::min);
    assert!(end > start.block, "empty interval carved at {}", start);
    end
}
