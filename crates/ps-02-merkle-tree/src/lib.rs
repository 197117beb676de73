//! # PS-02 Merkle Tree
//!
//! Merkle tree construction over each instance's deposit history.
//!
//! **Subsystem ID:** 2
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Maintain one fixed-depth MiMC-sponge tree per instance whose leaves are
//! the deposit commitments in leaf-index order, validate its root against
//! the pool contract's root history, and feed authentication paths to the
//! withdrawal prover.
//!
//! ## State Machine
//!
//! ```text
//! Unbuilt -> Loaded(stale|current) -> Validated -> Persisted
//!                 ^                        |
//!                 +---- unknown root ------+
//! ```
//!
//! A tree is never saved before the contract has accepted its root.
//!
//! ## Module Structure
//!
//! ```text
//! ps-02-merkle-tree/
//! ├── domain/          # Errors, paths, tree snapshot, withdrawal types
//! ├── algorithms/      # MiMC sponge, TreeHasher, incremental tree
//! ├── ports/           # MerkleTreeApi (inbound) + store/contract/prover (outbound)
//! ├── adapters/        # File/in-memory tree stores, JSON-RPC pool contract
//! ├── application/     # MerkleTreeService, withdrawal preparation
//! └── config.rs        # TreeConfig
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{FileTreeStore, InMemoryTreeStore, JsonRpcPoolContract};
pub use algorithms::{MerkleTree, MimcSpongeHasher, TreeHasher};
pub use application::{MerkleTreeService, ProverContext, WithdrawalPreparer};
pub use config::TreeConfig;
pub use domain::{
    MerklePath, MerkleTreeError, PreparedWithdrawal, TreeSnapshot, TreeState, WithdrawalRequest,
    WithdrawalWitness, DEFAULT_LEVELS,
};
pub use ports::{MerkleTreeApi, MockPoolContract, MockProver, PoolContract, Prover, TreeStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
