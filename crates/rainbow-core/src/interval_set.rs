//! Ordered set of disjoint intervals

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::{BlockPoint, Interval, IntervalStatus};

/// Disjoint intervals keyed by their start point
///
/// Because members never overlap, the member with the greatest start at or
/// below a point is the only one that can contain it, and the first member
/// above a point is the nearest claim ahead of it.
#[derive(Debug, Clone, Default)]
pub struct IntervalSet {
    entries: BTreeMap<BlockPoint, Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Members in keyspace order
    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.entries.values()
    }

    /// Insert `interval` unless it overlaps a member
    ///
    /// Returns false (and leaves the set untouched) on overlap.
    pub fn insert(&mut self, interval: Interval) -> bool {
        if self.overlapping(&interval).is_some() {
            return false;
        }
        self.entries.insert(interval.start_point(), interval);
        true
    }

    /// Member structurally equal to `interval`
    pub fn get(&self, interval: &Interval) -> Option<&Interval> {
        self.entries
            .get(&interval.start_point())
            .filter(|member| *member == interval)
    }

    pub(crate) fn get_mut(&mut self, interval: &Interval) -> Option<&mut Interval> {
        self.entries
            .get_mut(&interval.start_point())
            .filter(|member| **member == *interval)
    }

    pub fn contains(&self, interval: &Interval) -> bool {
        self.get(interval).is_some()
    }

    /// Remove the member structurally equal to `interval`
    pub fn remove(&mut self, interval: &Interval) -> Option<Interval> {
        self.get(interval)?;
        self.entries.remove(&interval.start_point())
    }

    /// Member containing `point`
    pub fn covering(&self, point: BlockPoint) -> Option<&Interval> {
        self.entries
            .range(..=point)
            .next_back()
            .map(|(_, member)| member)
            .filter(|member| member.contains(point))
    }

    /// First member at the same length starting strictly after `point`
    pub fn next_after(&self, point: BlockPoint) -> Option<&Interval> {
        self.entries
            .range((Bound::Excluded(point), Bound::Unbounded))
            .next()
            .map(|(_, member)| member)
            .filter(|member| member.string_length == point.string_length)
    }

    /// Some member overlapping `interval`
    pub fn overlapping(&self, interval: &Interval) -> Option<&Interval> {
        let start = interval.start_point();
        self.covering(start)
            .or_else(|| self.next_after(start))
            .filter(|member| member.overlaps(interval))
    }

    pub fn count_with_status(&self, status: IntervalStatus) -> usize {
        self.iter().filter(|member| member.status() == Some(status)).count()
    }
}

impl<'a> IntoIterator for &'a IntervalSet {
    type Item = &'a Interval;
    type IntoIter = std::collections::btree_map::Values<'a, BlockPoint, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
