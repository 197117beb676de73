//! # Event Filters
//!
//! Per-kind ordering and uniqueness enforcement.
//!
//! | Kind | Rule |
//! |------|------|
//! | Deposit | keep iff `leafIndex == position`; truncates at the first gap |
//! | Withdrawal | unique `nullifierHash` (first wins), ascending `blockNumber` |
//! | EncryptedNote | drop empty payloads, ascending `blockNumber` |

use std::cmp::Ordering;
use std::collections::HashSet;

use shared_types::{Event, EventKind};

use crate::domain::value_objects::FilteredEvents;

/// Canonical ordering: by leaf index when both events carry one, otherwise
/// by block number. Stable, so equal keys keep arrival order.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(compare_events);
}

fn compare_events(a: &Event, b: &Event) -> Ordering {
    match (a.leaf_index(), b.leaf_index()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.block_number().cmp(&b.block_number()),
    }
}

/// Apply the filter for `kind` and return the surviving sequence.
pub fn filter_events(kind: EventKind, events: Vec<Event>) -> FilteredEvents {
    let before = events.len();
    let (events, first_gap) = match kind {
        EventKind::Deposit => filter_deposits(events),
        EventKind::Withdrawal => (filter_withdrawals(events), None),
        EventKind::EncryptedNote => (filter_notes(events), None),
    };
    FilteredEvents {
        removed: before - events.len(),
        events,
        first_gap,
    }
}

/// Keep a deposit iff its leaf index equals the number kept so far.
///
/// Duplicates collapse to their first occurrence; a missing index stops the
/// sequence and is returned as the gap.
fn filter_deposits(mut events: Vec<Event>) -> (Vec<Event>, Option<u32>) {
    sort_events(&mut events);
    let mut kept: Vec<Event> = Vec::with_capacity(events.len());
    let mut first_gap = None;

    for event in events {
        let Some(leaf_index) = event.leaf_index() else {
            continue;
        };
        let expected = kept.len() as u32;
        if leaf_index == expected && first_gap.is_none() {
            kept.push(event);
        } else if leaf_index > expected && first_gap.is_none() {
            first_gap = Some(expected);
        }
    }
    (kept, first_gap)
}

fn filter_withdrawals(events: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Event> = events
        .into_iter()
        .filter(|event| match event {
            Event::Withdrawal(w) => seen.insert(w.nullifier_hash.to_lowercase()),
            _ => false,
        })
        .collect();
    sort_events(&mut unique);
    unique
}

fn filter_notes(events: Vec<Event>) -> Vec<Event> {
    let mut notes: Vec<Event> = events
        .into_iter()
        .filter(|event| match event {
            Event::EncryptedNote(n) => {
                let payload = n.encrypted_note.trim();
                !payload.is_empty() && payload != "0x"
            }
            _ => false,
        })
        .collect();
    sort_events(&mut notes);
    notes
}

/// First position whose deposit does not carry the matching leaf index.
///
/// Returns `(expected, found)`.
pub fn first_leaf_mismatch(events: &[Event]) -> Option<(u32, u32)> {
    events.iter().enumerate().find_map(|(i, event)| {
        let found = event.leaf_index()?;
        (found != i as u32).then_some((i as u32, found))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shared_types::{DepositEvent, EncryptedNoteEvent, WithdrawalEvent};

    fn deposit(leaf_index: u32, block_number: u64) -> Event {
        Event::Deposit(DepositEvent {
            timestamp: 1_600_000_000,
            commitment: format!("0x{:064x}", leaf_index + 1),
            block_number,
            transaction_hash: format!("0x{:064x}", block_number),
            leaf_index,
        })
    }

    fn withdrawal(nullifier: u64, block_number: u64) -> Event {
        Event::Withdrawal(WithdrawalEvent {
            to: "0x0000000000000000000000000000000000000001".to_string(),
            fee: "0".to_string(),
            block_number,
            nullifier_hash: format!("0x{:064x}", nullifier),
            transaction_hash: format!("0x{:064x}", block_number),
        })
    }

    fn note(payload: &str, block_number: u64) -> Event {
        Event::EncryptedNote(EncryptedNoteEvent {
            transaction_hash: format!("0x{:064x}", block_number),
            block_number,
            encrypted_note: payload.to_string(),
        })
    }

    #[test]
    fn test_deposit_duplicates_collapse() {
        let events = vec![deposit(0, 1), deposit(1, 2), deposit(1, 2), deposit(2, 3)];
        let filtered = filter_events(EventKind::Deposit, events);
        assert_eq!(filtered.events.len(), 3);
        assert_eq!(filtered.removed, 1);
        assert_eq!(filtered.first_gap, None);
    }

    #[test]
    fn test_deposit_gap_truncates_and_reports() {
        let events = vec![deposit(0, 1), deposit(1, 2), deposit(3, 4), deposit(4, 5)];
        let filtered = filter_events(EventKind::Deposit, events);
        assert_eq!(filtered.events.len(), 2);
        assert_eq!(filtered.first_gap, Some(2));
    }

    #[test]
    fn test_deposits_out_of_order_are_sorted() {
        let events = vec![deposit(2, 3), deposit(0, 1), deposit(1, 2)];
        let filtered = filter_events(EventKind::Deposit, events);
        let indices: Vec<_> = filtered.events.iter().filter_map(Event::leaf_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_withdrawal_first_occurrence_wins() {
        let events = vec![withdrawal(7, 20), withdrawal(8, 10), withdrawal(7, 30)];
        let filtered = filter_events(EventKind::Withdrawal, events);
        let blocks: Vec<_> = filtered.events.iter().map(Event::block_number).collect();
        assert_eq!(blocks, vec![10, 20]);
        assert_eq!(filtered.removed, 1);
    }

    #[test]
    fn test_nullifier_comparison_ignores_case() {
        let mut upper = withdrawal(10, 5);
        if let Event::Withdrawal(w) = &mut upper {
            w.nullifier_hash = w.nullifier_hash.to_uppercase().replacen("0X", "0x", 1);
        }
        let filtered = filter_events(EventKind::Withdrawal, vec![withdrawal(10, 5), upper]);
        assert_eq!(filtered.events.len(), 1);
    }

    #[test]
    fn test_notes_drop_empty_payloads() {
        let events = vec![note("0xabcd", 9), note("", 3), note("0x", 4), note("0x01", 2)];
        let filtered = filter_events(EventKind::EncryptedNote, events);
        let blocks: Vec<_> = filtered.events.iter().map(Event::block_number).collect();
        assert_eq!(blocks, vec![2, 9]);
    }

    #[test]
    fn test_first_leaf_mismatch() {
        assert_eq!(first_leaf_mismatch(&[deposit(0, 1), deposit(1, 2)]), None);
        assert_eq!(
            first_leaf_mismatch(&[deposit(0, 1), deposit(2, 3)]),
            Some((1, 2))
        );
    }

    #[test]
    fn test_empty_input_is_noop() {
        for kind in EventKind::ALL {
            let filtered = filter_events(kind, Vec::new());
            assert!(filtered.events.is_empty());
            assert_eq!(filtered.removed, 0);
        }
    }

    proptest! {
        /// Property: filtered deposits are exactly `0..n` by position.
        #[test]
        fn prop_deposits_are_contiguous(indices in proptest::collection::vec(0u32..40, 0..80)) {
            let events: Vec<Event> = indices
                .iter()
                .map(|i| deposit(*i, 100 + *i as u64))
                .collect();
            let filtered = filter_events(EventKind::Deposit, events);
            for (i, event) in filtered.events.iter().enumerate() {
                prop_assert_eq!(event.leaf_index(), Some(i as u32));
            }
        }

        /// Property: withdrawals are unique by nullifier and block-ordered.
        #[test]
        fn prop_withdrawals_unique_and_ordered(
            items in proptest::collection::vec((0u64..30, 0u64..500), 0..60)
        ) {
            let events: Vec<Event> = items.iter().map(|(n, b)| withdrawal(*n, *b)).collect();
            let filtered = filter_events(EventKind::Withdrawal, events);
            let mut seen = HashSet::new();
            for event in &filtered.events {
                let nullifier = event.field(shared_types::IndexedField::NullifierHash);
                prop_assert!(seen.insert(nullifier.map(str::to_string)));
            }
            for pair in filtered.events.windows(2) {
                prop_assert!(pair[0].block_number() <= pair[1].block_number());
            }
        }

        /// Property: filtering is idempotent.
        #[test]
        fn prop_filter_idempotent(indices in proptest::collection::vec(0u32..20, 0..40)) {
            let events: Vec<Event> = indices.iter().map(|i| deposit(*i, *i as u64)).collect();
            let once = filter_events(EventKind::Deposit, events);
            let twice = filter_events(EventKind::Deposit, once.events.clone());
            prop_assert_eq!(once.events, twice.events);
            prop_assert_eq!(twice.removed, 0);
        }
    }
}
