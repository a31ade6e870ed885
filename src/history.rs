//! Bounded history of successful results.
//!
//! Records are kept most-recent-first. When the store is full, appending
//! evicts the oldest record (the tail) before inserting at the head. Records
//! are never touched again after insertion, so plain FIFO order is also
//! least-recently-used order.
//!
//! The store only holds [`ResourceId`]s. Evicted and cleared records are
//! handed back to the caller, which owns releasing their images.

use crate::resources::ResourceId;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// One successful background removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImageRecord {
    pub original: ResourceId,
    pub processed: ResourceId,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ResultHistory {
    records: VecDeque<ProcessedImageRecord>,
    capacity: usize,
}

impl ResultHistory {
    /// Create an empty history. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the head, returning the evicted tail record if full.
    pub fn append(&mut self, record: ProcessedImageRecord) -> Option<ProcessedImageRecord> {
        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_back()
        } else {
            None
        };
        self.records.push_front(record);
        evicted
    }

    /// Records, most recent first.
    pub fn list(&self) -> impl Iterator<Item = &ProcessedImageRecord> {
        self.records.iter()
    }

    /// Remove every record, returning them most recent first.
    pub fn clear(&mut self) -> Vec<ProcessedImageRecord> {
        self.records.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
