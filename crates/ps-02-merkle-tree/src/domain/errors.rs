//! # Domain Errors
//!
//! Error types for Merkle Tree Construction.

use ps_01_event_sync::EventSyncError;
use shared_types::EncodingError;
use thiserror::Error;

/// Merkle tree error types.
#[derive(Debug, Error)]
pub enum MerkleTreeError {
    /// Tree depth outside the supported range.
    #[error("Invalid tree depth: {0} (expected 1..=32)")]
    InvalidLevels(usize),

    /// Appending would exceed `2^levels` leaves.
    #[error("Tree is full: capacity {capacity}, requested {requested}")]
    TreeFull {
        /// Maximum number of leaves
        capacity: usize,
        /// Leaf count the insert would reach
        requested: usize,
    },

    /// Path requested for a leaf that does not exist.
    #[error("Leaf index {index} out of range (tree has {len} leaves)")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Current leaf count
        len: usize,
    },

    /// Commitment is not a leaf of the tree.
    #[error("Commitment not found in tree: {0}")]
    LeafNotFound(String),

    /// Value is not a valid field element.
    #[error("Invalid field element: {0}")]
    InvalidElement(String),

    /// Persisted tree state is inconsistent with its own leaves.
    #[error("Persisted tree is corrupt: {0}")]
    CorruptTree(String),

    /// The contract does not recognise the computed root.
    #[error("Root {root} is not known by the {instance} pool contract")]
    UnknownRoot {
        /// Hex root
        root: String,
        /// Instance key
        instance: String,
    },

    /// Tree persistence failed.
    #[error("Tree store error: {0}")]
    Store(String),

    /// Contract read failed.
    #[error("Contract call failed: {0}")]
    Contract(String),

    /// The prover rejected the witness or could not start.
    #[error("Prover error: {0}")]
    Prover(String),

    /// The note's nullifier already appears in the withdrawal history.
    #[error("The note has already been spent (nullifier {0})")]
    NullifierSpent(String),

    /// Deposit events could not be synchronized.
    #[error(transparent)]
    Sync(#[from] EventSyncError),
}

impl MerkleTreeError {
    /// Whether this error signals inconsistent proof data rather than a
    /// transport failure.
    pub fn is_fatal(&self) -> bool {
        match self {
            MerkleTreeError::UnknownRoot { .. } | MerkleTreeError::CorruptTree(_) => true,
            MerkleTreeError::Sync(e) => e.is_fatal(),
            _ => false,
        }
    }
}

impl From<EncodingError> for MerkleTreeError {
    fn from(e: EncodingError) -> Self {
        MerkleTreeError::InvalidElement(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_root_is_fatal() {
        let err = MerkleTreeError::UnknownRoot {
            root: "0x01".to_string(),
            instance: "1_eth_0.1".to_string(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("1_eth_0.1"));
    }

    #[test]
    fn test_sync_errors_keep_their_class() {
        let aborted: MerkleTreeError = EventSyncError::BatchAborted {
            from_block: 1,
            to_block: 2,
            failed: 1,
        }
        .into();
        assert!(aborted.is_fatal());

        let transient: MerkleTreeError = EventSyncError::Provider("timeout".to_string()).into();
        assert!(!transient.is_fatal());
    }
}
