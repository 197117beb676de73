//! # PS-01 Event Sync
//!
//! Event synchronization for privacy-pool instances.
//!
//! **Subsystem ID:** 1  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Produce one authoritative, deduplicated, ordered event set per instance
//! and event kind by reconciling four sources:
//!
//! | Source | Role | On failure |
//! |--------|------|------------|
//! | Persisted store | Previously synced events | treated as empty |
//! | Bundled snapshot | Cold-start seed (has-cache instances) | treated as empty |
//! | Indexer | Pre-aggregated history + sync height | fall back to RPC |
//! | Node RPC | Batched, retried log scan up to head | batched abort is fatal |
//!
//! ## Invariants
//!
//! - Deposits: `events[i].leafIndex == i`.
//! - Withdrawals: unique `nullifierHash`, ascending `blockNumber`.
//! - `lastBlock` never moves backwards.
//!
//! ## Module Structure
//!
//! ```text
//! ps-01-event-sync/
//! ├── domain/          # Errors, block ranges, per-kind filters
//! ├── algorithms/      # Fetch planning, bounded retry, merge
//! ├── ports/           # EventSyncApi (inbound) + sources/store (outbound)
//! ├── adapters/        # JSON-RPC, GraphQL indexer, stores, snapshot codec
//! ├── application/     # EventService, registry, offline snapshot engine
//! └── config.rs        # SyncConfig, NetworksConfig
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    connect_http, FileEventStore, GraphIndexer, HttpProvider, HttpSourceFactory,
    InMemoryEventStore, JsonRpcLogProvider, SnapshotDir,
};
pub use algorithms::{
    merge_events, plan_fetch, retry_range, FetchPlan, MergeOutcome, RetryOutcome, RetryPolicy,
};
pub use application::{
    snapshot_status, verify_snapshots, CollectionStatus, EventService, EventServiceRegistry,
    EventSources, RpcFetcher, SnapshotSync, SyncReport, SyncSelection, VerifyReport,
};
pub use config::{ContractBinding, NetworkConfig, NetworksConfig, SyncConfig, TokenConfig};
pub use domain::{
    filter_events, sort_events, BlockRange, EventSyncError, FilteredEvents, IndexedEvents,
    LogFilter,
};
pub use ports::{
    EventIndexer, EventStore, EventSyncApi, IndexerRequest, LogProvider, LogProviderFactory,
    MockEventSync, MockIndexer, MockLogProvider, MockSnapshotSource, SnapshotSource,
    StaticSourceFactory,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
