//! # Event Service
//!
//! Per-instance orchestrator. Merges the persisted store, the bundled
//! snapshot, the indexer and the node into one filtered `EventSet` per
//! event kind, and keeps it persisted.
//!
//! Every source except a batched RPC abort is optional: a failing store,
//! snapshot or indexer is logged and treated as "no data".

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ps_telemetry::{
    log_collection_event, metric_inc, EVENTS_FETCHED, EVENTS_SAVED, LAST_SYNCED_BLOCK,
    LEAF_GAPS, SOURCE_FAILURES,
};
use shared_types::{BlockNumber, Event, EventKind, EventQuery, EventSet, InstanceKey};
use tracing::{debug, warn};

use super::fetch::RpcFetcher;
use crate::algorithms::merge_events;
use crate::config::{ContractBinding, NetworkConfig, SyncConfig};
use crate::domain::{BlockRange, EventSyncError, LogFilter};
use crate::ports::{
    EventIndexer, EventStore, EventSyncApi, IndexerRequest, LogProvider, SnapshotSource,
};

/// Data sources shared by the services of one network.
#[derive(Clone)]
pub struct EventSources {
    /// Persisted collections
    pub store: Arc<dyn EventStore>,
    /// Bundled snapshots
    pub snapshots: Arc<dyn SnapshotSource>,
    /// Node connection
    pub provider: Arc<dyn LogProvider>,
    /// Remote indexer, if configured
    pub indexer: Option<Arc<dyn EventIndexer>>,
}

/// Event synchronization for one instance.
pub struct EventService {
    instance: InstanceKey,
    network: NetworkConfig,
    store: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotSource>,
    indexer: Option<Arc<dyn EventIndexer>>,
    fetcher: RpcFetcher,
}

impl EventService {
    /// Create a service for `instance` on `network`.
    pub fn new(
        instance: InstanceKey,
        network: NetworkConfig,
        config: SyncConfig,
        sources: EventSources,
    ) -> Self {
        let fetcher = RpcFetcher::new(sources.provider, config, instance.network_id);
        Self {
            instance,
            network,
            store: sources.store,
            snapshots: sources.snapshots,
            indexer: sources.indexer,
            fetcher,
        }
    }

    /// Instance served.
    pub fn instance(&self) -> &InstanceKey {
        &self.instance
    }

    /// Whether the bundled snapshot may seed this instance.
    pub fn has_cache(&self) -> bool {
        self.network.has_cache(&self.instance.currency)
    }

    fn binding(&self, kind: EventKind) -> Result<ContractBinding, EventSyncError> {
        self.network
            .binding(&self.instance, kind)
            .ok_or_else(|| EventSyncError::UnknownInstance(format!("{} ({kind})", self.instance)))
    }

    async fn load_stored(&self, collection: &str) -> Option<EventSet> {
        let events = match self.store.get_all(collection).await {
            Ok(events) if !events.is_empty() => events,
            Ok(_) => return None,
            Err(e) => {
                warn!(collection, error = %e, "Failed to read persisted events");
                metric_inc!(SOURCE_FAILURES, &["store"]);
                return None;
            }
        };
        let last_event = events.last().map(Event::block_number).unwrap_or(0);
        let recorded = match self.store.get_last_block(collection).await {
            Ok(recorded) => recorded,
            Err(e) => {
                warn!(collection, error = %e, "Failed to read last block record");
                None
            }
        };
        Some(EventSet::new(events, recorded.unwrap_or(0).max(last_event)))
    }

    async fn load_snapshot(&self, collection: &str) -> Option<EventSet> {
        match self.snapshots.load(collection).await {
            Ok(set) => set,
            Err(e) => {
                warn!(collection, error = %e, "Failed to load bundled snapshot");
                metric_inc!(SOURCE_FAILURES, &["snapshot"]);
                None
            }
        }
    }

    /// Indexer events from `from_block`, then node events from the indexer's
    /// sync height (never below `from_block`).
    async fn fetch_new_events(
        &self,
        kind: EventKind,
        binding: &ContractBinding,
        from_block: BlockNumber,
    ) -> Result<Vec<Event>, EventSyncError> {
        let mut events = Vec::new();
        let mut last_sync_block = from_block;

        if let Some(indexer) = &self.indexer {
            let request = IndexerRequest {
                kind,
                instance: self.instance.clone(),
                from_block,
            };
            match indexer.query_events(&request).await {
                Ok(indexed) => {
                    EVENTS_FETCHED
                        .with_label_values(&[kind.collection_prefix(), "indexer"])
                        .inc_by(indexed.events.len() as u64);
                    last_sync_block = from_block.max(indexed.last_sync_block);
                    events = indexed.events;
                }
                Err(e) => {
                    warn!(
                        instance = %self.instance,
                        method = kind.indexer_method(),
                        error = %e,
                        "Indexer unavailable, falling back to RPC"
                    );
                    metric_inc!(SOURCE_FAILURES, &["indexer"]);
                }
            }
        }

        let filter = LogFilter::new(
            binding.address.clone(),
            kind,
            BlockRange::new(last_sync_block, last_sync_block),
        );
        let rpc_events = self.fetcher.fetch_from(&filter, last_sync_block).await?;

        // Indexer and node overlap at the sync height.
        let mut seen: HashSet<String> = events.iter().map(Event::natural_key).collect();
        events.extend(
            rpc_events
                .into_iter()
                .filter(|event| seen.insert(event.natural_key())),
        );
        Ok(events)
    }

    /// Persist a merged set. Failures are logged, never raised.
    async fn save_events(&self, kind: EventKind, collection: &str, set: &EventSet) {
        if set.is_empty() {
            return;
        }
        if !self.store.is_available() {
            debug!(collection, "Store unavailable, skipping save");
            return;
        }
        if let Err(e) = self.store.put_many(collection, &set.events).await {
            warn!(collection, error = %e, "Failed to save events");
            return;
        }
        if let Err(e) = self.store.put_last_block(collection, set.last_block).await {
            warn!(collection, error = %e, "Failed to save last block record");
            return;
        }
        EVENTS_SAVED
            .with_label_values(&[kind.collection_prefix()])
            .inc_by(set.len() as u64);
    }
}

#[async_trait]
impl EventSyncApi for EventService {
    async fn get_events(&self, kind: EventKind) -> Result<Option<EventSet>, EventSyncError> {
        let collection = self.instance.collection_name(kind);
        if let Some(set) = self.load_stored(&collection).await {
            return Ok(Some(set));
        }
        if self.has_cache() {
            return Ok(self.load_snapshot(&collection).await);
        }
        Ok(None)
    }

    async fn update_events(
        &self,
        kind: EventKind,
        known: Option<EventSet>,
    ) -> Result<EventSet, EventSyncError> {
        let binding = self.binding(kind)?;
        let collection = self.instance.collection_name(kind);

        let saved = match known {
            Some(set) => Some(set),
            None => self.get_events(kind).await?,
        };
        let from_block = saved
            .as_ref()
            .map(|set| set.last_block + 1)
            .unwrap_or(binding.deployed_block)
            .max(binding.deployed_block);

        let fresh = self.fetch_new_events(kind, &binding, from_block).await?;
        let fetched = fresh.len();
        let outcome = merge_events(kind, saved, fresh, from_block);

        if let Some(expected) = outcome.first_gap {
            log_collection_event!(
                warn,
                collection,
                "Deposit sequence truncated at missing leaf index",
                expected
            );
            LEAF_GAPS.inc();
        }

        self.save_events(kind, &collection, &outcome.set).await;
        LAST_SYNCED_BLOCK
            .with_label_values(&[&collection])
            .set(outcome.set.last_block as f64);

        log_collection_event!(
            debug,
            collection,
            "Updated events",
            from_block,
            fetched,
            total = outcome.set.len(),
            last_block = outcome.set.last_block
        );
        Ok(outcome.set)
    }

    async fn find_event(
        &self,
        kind: EventKind,
        query: &EventQuery,
    ) -> Result<Option<Event>, EventSyncError> {
        let collection = self.instance.collection_name(kind);

        match self
            .store
            .get_from_index(&collection, query.field, &query.value)
            .await
        {
            Ok(Some(event)) => return Ok(Some(event)),
            Ok(None) => {}
            Err(e) => warn!(collection, error = %e, "Indexed lookup failed"),
        }

        if let Some(set) = self.get_events(kind).await? {
            if let Some(event) = set.find(query) {
                return Ok(Some(event.clone()));
            }
        }

        let refreshed = self.update_events(kind, None).await?;
        Ok(refreshed.find(query).cloned())
    }
}
