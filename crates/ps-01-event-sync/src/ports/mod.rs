//! # Ports Module
//!
//! Hexagonal architecture ports for Event Synchronization.

pub mod inbound;
pub mod outbound;

pub use inbound::{EventSyncApi, MockEventSync};
pub use outbound::{
    EventIndexer, EventStore, IndexerRequest, LogProvider, LogProviderFactory, MockIndexer,
    MockLogProvider, MockSnapshotSource, SnapshotSource, StaticSourceFactory,
};
