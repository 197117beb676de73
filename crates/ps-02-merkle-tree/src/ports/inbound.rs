//! # Inbound Ports
//!
//! API exposed by a `MerkleTreeService` to withdrawal preparation and tools.

use async_trait::async_trait;

use crate::algorithms::{MerkleTree, TreeHasher};
use crate::domain::{MerkleTreeError, TreeState};

/// Merkle tree API for one instance.
#[async_trait]
pub trait MerkleTreeApi: Send + Sync {
    /// Node hash used by the trees this service builds.
    type Hasher: TreeHasher + 'static;

    /// Previously persisted tree, if any. Not validated against the chain.
    async fn get_tree(&self) -> Result<Option<MerkleTree<Self::Hasher>>, MerkleTreeError>;

    /// Sync deposits, extend or rebuild the tree, check its root on-chain and
    /// persist it. A root the contract does not know is an error and the
    /// tree is not saved.
    async fn build_tree(&self) -> Result<MerkleTree<Self::Hasher>, MerkleTreeError>;

    /// Deposits the contract has accepted (its `nextIndex`).
    async fn anonymity_set(&self) -> Result<u32, MerkleTreeError>;

    /// Current build state.
    fn state(&self) -> TreeState;
}
