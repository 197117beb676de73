//! # Application Module
//!
//! Services orchestrating the domain, the algorithms and the outbound ports.

pub mod fetch;
pub mod registry;
pub mod service;
pub mod snapshot_sync;

pub use fetch::RpcFetcher;
pub use registry::EventServiceRegistry;
pub use service::{EventService, EventSources};
pub use snapshot_sync::{
    kind_of_collection, snapshot_status, verify_snapshots, CollectionStatus, SnapshotSync,
    SyncReport, SyncSelection, VerifyReport,
};
