//! Multi-way merge of per-table query results.
//!
//! This module provides an iterator that merges several [`TimeSeries`] into
//! one stream ordered by timestamp.

use super::{TimeSeries, TimeSeriesRecord};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Entry in the merge heap
struct MergeEntry {
    record: TimeSeriesRecord,
    source: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest timestamp first)
        other.record.timestamp.cmp(&self.record.timestamp).then_with(|| {
            // For equal timestamps, the table requested first wins
            other.source.cmp(&self.source)
        })
    }
}

/// Chronological merge of several tables' rows.
///
/// Each source contributes at most one entry to the heap at a time, so rows
/// of one table are emitted in the order that table's scan produced them.
/// The first error from any source is returned and ends the stream.
pub struct MergedTimeSeries {
    heap: BinaryHeap<MergeEntry>,
    sources: Vec<TimeSeries>,
    error: Option<Error>,
    done: bool,
}

impl MergedTimeSeries {
    /// Merge the given per-table series.
    pub fn new(sources: Vec<TimeSeries>) -> Self {
        let mut merged = Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
            error: None,
            done: false,
        };
        for index in 0..merged.sources.len() {
            merged.advance_source(index);
        }
        merged
    }

    /// Pull the next record of a source into the heap
    fn advance_source(&mut self, index: usize) {
        match self.sources[index].next() {
            Some(Ok(record)) => self.heap.push(MergeEntry { record, source: index }),
            Some(Err(e)) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
            None => {}
        }
    }
}

impl Iterator for MergedTimeSeries {
    type Item = Result<TimeSeriesRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(e) = self.error.take() {
            self.done = true;
            self.heap.clear();
            return Some(Err(e));
        }

        let entry = match self.heap.pop() {
            Some(entry) => entry,
            None => {
                self.done = true;
                return None;
            }
        };
        self.advance_source(entry.source);
        Some(Ok(entry.record))
    }
}
