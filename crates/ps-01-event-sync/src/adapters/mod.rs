//! # Adapters
//!
//! Implementations of the outbound ports: node RPC via `ethers`, subgraph indexer,
//! persisted stores and the snapshot codec.

pub mod abi;
pub mod file_store;
pub mod graph_indexer;
pub mod json_rpc;
pub mod memory_store;
pub mod snapshot;

pub use abi::{
    decode_log, decode_logs, event_signature, event_topic, DepositLog, EncryptedNoteLog,
    WithdrawalLog,
};
pub use file_store::FileEventStore;
pub use graph_indexer::GraphIndexer;
pub use json_rpc::{connect_http, HttpProvider, HttpSourceFactory, JsonRpcLogProvider};
pub use memory_store::InMemoryEventStore;
pub use snapshot::{
    decode_snapshot, encode_snapshot, pack_snapshots, read_snapshot_file, write_snapshot_file,
    SnapshotDir,
};
