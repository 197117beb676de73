//! In-memory event store.
//!
//! Used by unit tests and as the collection model shared with the file store:
//! each collection is a map from natural key to event, so saving the same
//! events twice leaves it unchanged.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{BlockNumber, Event, IndexedField};

use crate::domain::{sort_events, EventSyncError};
use crate::ports::EventStore;

/// One collection keyed by natural key.
pub(crate) type Collection = BTreeMap<String, Event>;

/// Upsert `events`; returns how many entries were inserted or replaced.
pub(crate) fn upsert(collection: &mut Collection, events: &[Event]) -> usize {
    let mut changed = 0;
    for event in events {
        let key = event.natural_key();
        if collection.get(&key) != Some(event) {
            collection.insert(key, event.clone());
            changed += 1;
        }
    }
    changed
}

/// Events of a collection in canonical order.
pub(crate) fn ordered(collection: &Collection) -> Vec<Event> {
    let mut events: Vec<Event> = collection.values().cloned().collect();
    sort_events(&mut events);
    events
}

/// First event whose indexed field equals `key`.
pub(crate) fn lookup(collection: &Collection, field: IndexedField, key: &str) -> Option<Event> {
    collection
        .values()
        .find(|event| {
            event
                .field(field)
                .map(|value| value.eq_ignore_ascii_case(key))
                .unwrap_or(false)
        })
        .cloned()
}

/// In-memory event store for unit tests.
#[derive(Default)]
pub struct InMemoryEventStore {
    collections: RwLock<HashMap<String, Collection>>,
    last_blocks: RwLock<HashMap<String, BlockNumber>>,
    blocked: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a blocked store (writes are skipped by the service).
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Number of `put_many` calls that changed at least one entry.
    pub fn effective_writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<Event>, EventSyncError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(ordered)
            .unwrap_or_default())
    }

    async fn get_from_index(
        &self,
        collection: &str,
        field: IndexedField,
        key: &str,
    ) -> Result<Option<Event>, EventSyncError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| lookup(c, field, key)))
    }

    async fn put_many(&self, collection: &str, events: &[Event]) -> Result<(), EventSyncError> {
        let changed = upsert(
            self.collections
                .write()
                .entry(collection.to_string())
                .or_default(),
            events,
        );
        if changed > 0 {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn put_last_block(
        &self,
        collection: &str,
        block: BlockNumber,
    ) -> Result<(), EventSyncError> {
        self.last_blocks.write().insert(collection.to_string(), block);
        Ok(())
    }

    async fn get_last_block(&self, collection: &str) -> Result<Option<BlockNumber>, EventSyncError> {
        Ok(self.last_blocks.read().get(collection).copied())
    }

    fn is_available(&self) -> bool {
        !self.blocked.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::WithdrawalEvent;

    fn withdrawal(nullifier: u64, block_number: u64) -> Event {
        Event::Withdrawal(WithdrawalEvent {
            to: "0x01".to_string(),
            fee: "0".to_string(),
            block_number,
            nullifier_hash: format!("0x{:064x}", nullifier),
            transaction_hash: format!("0x{:064x}", block_number),
        })
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = InMemoryEventStore::new();
        let events = vec![withdrawal(1, 10), withdrawal(2, 5)];
        store.put_many("withdrawals_1_eth_0.1", &events).await.unwrap();
        store.put_many("withdrawals_1_eth_0.1", &events).await.unwrap();
        assert_eq!(store.effective_writes(), 1);

        let all = store.get_all("withdrawals_1_eth_0.1").await.unwrap();
        let blocks: Vec<_> = all.iter().map(Event::block_number).collect();
        assert_eq!(blocks, vec![5, 10]);
    }

    #[tokio::test]
    async fn test_index_lookup() {
        let store = InMemoryEventStore::new();
        store
            .put_many("withdrawals_1_eth_0.1", &[withdrawal(9, 10)])
            .await
            .unwrap();
        let key = format!("0x{:064x}", 9);
        let found = store
            .get_from_index("withdrawals_1_eth_0.1", IndexedField::NullifierHash, &key)
            .await
            .unwrap();
        assert!(found.is_some());
        let missing = store
            .get_from_index("withdrawals_1_eth_0.1", IndexedField::Commitment, &key)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let store = InMemoryEventStore::new();
        assert!(store.get_all("nothing").await.unwrap().is_empty());
        assert_eq!(store.get_last_block("nothing").await.unwrap(), None);
    }
}
