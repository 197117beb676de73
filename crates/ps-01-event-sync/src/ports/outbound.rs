//! # Outbound Ports
//!
//! Traits for the event sources and the persisted store.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{BlockNumber, Event, EventKind, EventSet, IndexedField, InstanceKey, NetworkId};

use crate::config::NetworkConfig;
use crate::domain::{BlockRange, EventSyncError, IndexedEvents, LogFilter};

/// Indexer query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerRequest {
    /// Event kind (selects the query method)
    pub kind: EventKind,
    /// Instance being synced
    pub instance: InstanceKey,
    /// First block of interest
    pub from_block: BlockNumber,
}

/// Remote indexer - outbound port.
#[async_trait]
pub trait EventIndexer: Send + Sync {
    /// Events at or after `request.from_block` plus the indexer's sync height.
    async fn query_events(&self, request: &IndexerRequest)
        -> Result<IndexedEvents, EventSyncError>;
}

/// Node log access - outbound port.
///
/// Errors must carry the provider's message verbatim so the
/// accepted-block hint survives.
#[async_trait]
pub trait LogProvider: Send + Sync {
    /// Current head block.
    async fn block_number(&self) -> Result<BlockNumber, EventSyncError>;

    /// Decoded events matching `filter`, in chain order.
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Event>, EventSyncError>;
}

/// Builds per-network sources - outbound port.
///
/// The registry calls this once per network and shares the result between
/// every instance on that network.
pub trait LogProviderFactory: Send + Sync {
    /// Log provider bound to the network's node.
    fn provider_for(
        &self,
        network_id: NetworkId,
        network: &NetworkConfig,
    ) -> Result<Arc<dyn LogProvider>, EventSyncError>;

    /// Indexer for the network, if one is configured.
    fn indexer_for(
        &self,
        _network_id: NetworkId,
        _network: &NetworkConfig,
    ) -> Option<Arc<dyn EventIndexer>> {
        None
    }
}

/// Local persisted collections - outbound port.
///
/// Writes are upserts keyed by each event's natural key; the engine never
/// deletes events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Every event of a collection in canonical order (empty if absent).
    async fn get_all(&self, collection: &str) -> Result<Vec<Event>, EventSyncError>;

    /// Indexed lookup.
    async fn get_from_index(
        &self,
        collection: &str,
        field: IndexedField,
        key: &str,
    ) -> Result<Option<Event>, EventSyncError>;

    /// Upsert events.
    async fn put_many(&self, collection: &str, events: &[Event]) -> Result<(), EventSyncError>;

    /// Record the covered block of a collection.
    async fn put_last_block(
        &self,
        collection: &str,
        block: BlockNumber,
    ) -> Result<(), EventSyncError>;

    /// Covered block recorded for a collection.
    async fn get_last_block(&self, collection: &str) -> Result<Option<BlockNumber>, EventSyncError>;

    /// False while the store is blocked (writes are then skipped).
    fn is_available(&self) -> bool {
        true
    }
}

/// Bundled snapshots - outbound port.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Snapshot of a collection, if one ships.
    async fn load(&self, collection: &str) -> Result<Option<EventSet>, EventSyncError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock indexer for testing.
#[derive(Default)]
pub struct MockIndexer {
    /// Events served per kind.
    pub events: HashMap<EventKind, Vec<Event>>,
    /// Reported sync height.
    pub last_sync_block: BlockNumber,
    /// Should return errors?
    pub should_fail: bool,
    /// Requests received.
    pub requests: Mutex<Vec<IndexerRequest>>,
}

impl MockIndexer {
    /// Indexer serving `events` of `kind` up to `last_sync_block`.
    pub fn with_events(kind: EventKind, events: Vec<Event>, last_sync_block: BlockNumber) -> Self {
        let mut map = HashMap::new();
        map.insert(kind, events);
        Self {
            events: map,
            last_sync_block,
            ..Default::default()
        }
    }

    /// Indexer that always fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl EventIndexer for MockIndexer {
    async fn query_events(
        &self,
        request: &IndexerRequest,
    ) -> Result<IndexedEvents, EventSyncError> {
        self.requests.lock().push(request.clone());
        if self.should_fail {
            return Err(EventSyncError::Indexer("Mock failure".to_string()));
        }
        let events = self
            .events
            .get(&request.kind)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.block_number() >= request.from_block)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(IndexedEvents {
            events,
            last_sync_block: self.last_sync_block,
        })
    }
}

/// Mock node for testing.
///
/// Serves `events` filtered by kind and range. Scripted errors are returned
/// (one per call) before any call succeeds.
pub struct MockLogProvider {
    /// Chain events (all kinds).
    pub events: Mutex<Vec<Event>>,
    /// Reported head.
    pub head: Mutex<BlockNumber>,
    /// Error messages to return before succeeding.
    pub scripted_errors: Mutex<VecDeque<String>>,
    /// Ranges that always fail.
    pub failing_ranges: Mutex<Vec<BlockRange>>,
    /// Ranges requested, in call order.
    pub calls: Mutex<Vec<BlockRange>>,
}

impl MockLogProvider {
    /// Node with `events` and head `head`.
    pub fn new(events: Vec<Event>, head: BlockNumber) -> Self {
        Self {
            events: Mutex::new(events),
            head: Mutex::new(head),
            scripted_errors: Mutex::new(VecDeque::new()),
            failing_ranges: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue an error message for the next `get_logs` call.
    pub fn push_error(&self, message: impl Into<String>) {
        self.scripted_errors.lock().push_back(message.into());
    }

    /// Make every request overlapping `range` fail.
    pub fn fail_range(&self, range: BlockRange) {
        self.failing_ranges.lock().push(range);
    }

    /// Add events and move the head.
    pub fn append(&self, events: Vec<Event>, head: BlockNumber) {
        self.events.lock().extend(events);
        *self.head.lock() = head;
    }

    /// Number of `get_logs` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl LogProvider for MockLogProvider {
    async fn block_number(&self) -> Result<BlockNumber, EventSyncError> {
        Ok(*self.head.lock())
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Event>, EventSyncError> {
        let range = filter.range;
        self.calls.lock().push(range);

        if let Some(message) = self.scripted_errors.lock().pop_front() {
            return Err(EventSyncError::Provider(message));
        }
        let overlaps = self
            .failing_ranges
            .lock()
            .iter()
            .any(|f| f.from <= range.to && range.from <= f.to);
        if overlaps {
            return Err(EventSyncError::Provider("Mock failure".to_string()));
        }

        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.kind() == filter.kind && range.contains(e.block_number()))
            .cloned()
            .collect())
    }
}

/// Factory handing out fixed sources, for testing.
pub struct StaticSourceFactory {
    /// Provider returned for every network.
    pub provider: Arc<dyn LogProvider>,
    /// Indexer returned for every network.
    pub indexer: Option<Arc<dyn EventIndexer>>,
    /// Number of providers handed out.
    pub providers_built: Mutex<usize>,
}

impl StaticSourceFactory {
    /// Factory serving `provider` and no indexer.
    pub fn new(provider: Arc<dyn LogProvider>) -> Self {
        Self {
            provider,
            indexer: None,
            providers_built: Mutex::new(0),
        }
    }

    /// Also serve `indexer`.
    pub fn with_indexer(mut self, indexer: Arc<dyn EventIndexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }
}

impl LogProviderFactory for StaticSourceFactory {
    fn provider_for(
        &self,
        _network_id: NetworkId,
        _network: &NetworkConfig,
    ) -> Result<Arc<dyn LogProvider>, EventSyncError> {
        *self.providers_built.lock() += 1;
        Ok(self.provider.clone())
    }

    fn indexer_for(
        &self,
        _network_id: NetworkId,
        _network: &NetworkConfig,
    ) -> Option<Arc<dyn EventIndexer>> {
        self.indexer.clone()
    }
}

/// Snapshot source backed by a map, for testing.
#[derive(Default)]
pub struct MockSnapshotSource {
    /// Snapshots keyed by collection name.
    pub snapshots: HashMap<String, EventSet>,
}

impl MockSnapshotSource {
    /// Source serving one snapshot.
    pub fn with_snapshot(collection: impl Into<String>, set: EventSet) -> Self {
        let mut snapshots = HashMap::new();
        snapshots.insert(collection.into(), set);
        Self { snapshots }
    }
}

#[async_trait]
impl SnapshotSource for MockSnapshotSource {
    async fn load(&self, collection: &str) -> Result<Option<EventSet>, EventSyncError> {
        Ok(self.snapshots.get(collection).cloned())
    }
}
