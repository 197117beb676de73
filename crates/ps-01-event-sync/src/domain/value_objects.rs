//! # Value Objects
//!
//! Block ranges, fetch results and pipeline constants.

use serde::{Deserialize, Serialize};
use shared_types::{BlockNumber, Event, EventKind};

/// Concurrent sub-range requests per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Attempts per sub-range before it is reported as failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Base backoff; attempt `n` waits `n * DEFAULT_RETRY_DELAY_MS`.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Delay between request launches inside one batch.
pub const DEFAULT_STAGGER_MS: u64 = 20;

/// Ranges at least this long are fetched in batches.
pub const DEFAULT_BLOCK_SYNC_INTERVAL: u64 = 10_000;

/// Indexer page size.
pub const DEFAULT_INDEXER_PAGE_SIZE: usize = 1_000;

/// Provider error fragment preceding the highest accepted block.
pub const ACCEPTED_BLOCK_MARKER: &str = "after last accepted block";

/// Inclusive block range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    /// First block (inclusive)
    pub from: BlockNumber,
    /// Last block (inclusive)
    pub to: BlockNumber,
}

impl BlockRange {
    /// Create a range. `to < from` denotes an empty range.
    pub fn new(from: BlockNumber, to: BlockNumber) -> Self {
        Self { from, to }
    }

    /// Number of blocks covered.
    pub fn len(&self) -> u64 {
        if self.to < self.from {
            0
        } else {
            self.to - self.from + 1
        }
    }

    /// True when the range covers no block.
    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }

    /// Same range ending at `to`.
    pub fn with_to(&self, to: BlockNumber) -> Self {
        Self { from: self.from, to }
    }

    /// Whether `block` lies inside the range.
    pub fn contains(&self, block: BlockNumber) -> bool {
        block >= self.from && block <= self.to
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

/// Parameters of one log query against a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Contract emitting the events
    pub address: String,
    /// Event kind (selects the topic and decoder)
    pub kind: EventKind,
    /// Blocks to scan
    pub range: BlockRange,
}

impl LogFilter {
    /// Create a filter.
    pub fn new(address: impl Into<String>, kind: EventKind, range: BlockRange) -> Self {
        Self {
            address: address.into(),
            kind,
            range,
        }
    }

    /// Same filter over another range.
    pub fn with_range(&self, range: BlockRange) -> Self {
        Self {
            address: self.address.clone(),
            kind: self.kind,
            range,
        }
    }
}

/// Events returned by the indexer plus the block it has synced to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexedEvents {
    /// Events at or after the requested block
    pub events: Vec<Event>,
    /// Highest block the indexer has processed
    pub last_sync_block: BlockNumber,
}

/// Result of the type filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredEvents {
    /// Events that satisfy the kind's ordering and uniqueness invariants
    pub events: Vec<Event>,
    /// Number of events dropped
    pub removed: usize,
    /// First missing deposit leaf index, when the sequence was truncated
    pub first_gap: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_len() {
        assert_eq!(BlockRange::new(10, 19).len(), 10);
        assert_eq!(BlockRange::new(10, 10).len(), 1);
        assert!(BlockRange::new(11, 10).is_empty());
    }

    #[test]
    fn test_range_display() {
        assert_eq!(BlockRange::new(1, 2).to_string(), "[1, 2]");
    }
}
