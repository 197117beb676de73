//! # Event Merge
//!
//! Combines a saved `EventSet` with freshly fetched events.
//!
//! Saved events come first, then the new ones; the kind's filter sorts and
//! deduplicates the concatenation. `lastBlock` never moves backwards: it is
//! the larger of the saved boundary and the final event's block.

use shared_types::{BlockNumber, Event, EventKind, EventSet};

use crate::domain::filter_events;

/// Result of merging saved and fresh events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged, filtered set
    pub set: EventSet,
    /// Events dropped by the filter
    pub removed: usize,
    /// First missing deposit leaf index, if the sequence was truncated
    pub first_gap: Option<u32>,
    /// Whether the merged set differs from the saved one
    pub changed: bool,
}

/// Merge `fresh` into `saved`.
///
/// With no events at all, `lastBlock` stays at the saved boundary, or just
/// before `from_block` when nothing was saved.
pub fn merge_events(
    kind: EventKind,
    saved: Option<EventSet>,
    fresh: Vec<Event>,
    from_block: BlockNumber,
) -> MergeOutcome {
    let saved_len = saved.as_ref().map(EventSet::len);
    let saved_last = saved.as_ref().map(|s| s.last_block);

    let mut combined = saved.map(|s| s.events).unwrap_or_default();
    combined.extend(fresh);

    let filtered = filter_events(kind, combined);
    let last_block = match filtered.events.last() {
        Some(event) => event.block_number().max(saved_last.unwrap_or(0)),
        None => saved_last.unwrap_or_else(|| from_block.saturating_sub(1)),
    };

    let changed = match (saved_len, saved_last) {
        (Some(len), Some(last)) => len != filtered.events.len() || last != last_block,
        _ => !filtered.events.is_empty(),
    };

    MergeOutcome {
        set: EventSet::new(filtered.events, last_block),
        removed: filtered.removed,
        first_gap: filtered.first_gap,
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::DepositEvent;

    fn deposit(leaf_index: u32, block_number: u64) -> Event {
        Event::Deposit(DepositEvent {
            timestamp: 0,
            commitment: format!("0x{:064x}", leaf_index),
            block_number,
            transaction_hash: format!("0x{:064x}", block_number),
            leaf_index,
        })
    }

    #[test]
    fn test_merge_appends_new_suffix() {
        let saved = EventSet::new(vec![deposit(0, 90), deposit(1, 95)], 100);
        let outcome = merge_events(EventKind::Deposit, Some(saved), vec![deposit(2, 150)], 101);
        assert_eq!(outcome.set.len(), 3);
        assert_eq!(outcome.set.last_block, 150);
        assert!(outcome.changed);
    }

    #[test]
    fn test_merge_with_empty_fresh_is_identity() {
        let saved = EventSet::new(vec![deposit(0, 90), deposit(1, 95)], 100);
        let outcome = merge_events(EventKind::Deposit, Some(saved.clone()), vec![], 101);
        assert_eq!(outcome.set, saved);
        assert!(!outcome.changed);
    }

    #[test]
    fn test_merge_overlap_collapses() {
        let saved = EventSet::new(vec![deposit(0, 90), deposit(1, 95)], 95);
        let outcome = merge_events(
            EventKind::Deposit,
            Some(saved),
            vec![deposit(1, 95), deposit(2, 99)],
            95,
        );
        assert_eq!(outcome.set.len(), 3);
        assert_eq!(outcome.removed, 1);
    }

    #[test]
    fn test_merge_nothing_keeps_boundary() {
        let outcome = merge_events(EventKind::Withdrawal, None, vec![], 1_000);
        assert!(outcome.set.is_empty());
        assert_eq!(outcome.set.last_block, 999);
        assert!(!outcome.changed);
    }

    #[test]
    fn test_merge_reports_gap() {
        let outcome = merge_events(
            EventKind::Deposit,
            None,
            vec![deposit(0, 1), deposit(2, 3)],
            0,
        );
        assert_eq!(outcome.first_gap, Some(1));
        assert_eq!(outcome.set.len(), 1);
    }
}
