//! # Value Objects
//!
//! Tree paths, the persisted tree layout and the per-instance build state.

use serde::{Deserialize, Serialize};
use shared_types::{to_fixed_hex, U256};

/// Default tree depth (2^20 deposits per instance).
pub const DEFAULT_LEVELS: usize = 20;

/// Deepest supported tree.
pub const MAX_LEVELS: usize = 32;

/// Authentication path of one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerklePath {
    /// Sibling at each level, leaf level first
    pub path_elements: Vec<U256>,
    /// 0 when the node is a left child, 1 when it is a right child
    pub path_indices: Vec<u8>,
}

impl MerklePath {
    /// Fold `leaf` up the path with `hash_pair`.
    pub fn compute_root<F>(&self, leaf: U256, hash_pair: F) -> U256
    where
        F: Fn(&U256, &U256) -> U256,
    {
        self.path_elements
            .iter()
            .zip(&self.path_indices)
            .fold(leaf, |node, (sibling, index)| {
                if *index == 0 {
                    hash_pair(&node, sibling)
                } else {
                    hash_pair(sibling, &node)
                }
            })
    }

    /// Path elements as 0x-prefixed 32-byte hex strings.
    pub fn elements_hex(&self) -> Vec<String> {
        self.path_elements.iter().map(to_fixed_hex).collect()
    }
}

/// Persisted form of a tree: every layer, leaves first, root layer last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Tree depth
    pub levels: usize,
    /// `levels + 1` layers
    pub layers: Vec<Vec<U256>>,
}

impl TreeSnapshot {
    /// Persisted leaf count.
    pub fn leaf_count(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }
}

/// Build state of one instance's tree.
///
/// `Unbuilt -> Loaded -> Validated -> Persisted`. A failed root check
/// returns to `Loaded { stale: true }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum TreeState {
    /// Nothing loaded or built yet.
    #[default]
    Unbuilt,
    /// A tree is in memory; `stale` when it lags the deposit sequence or
    /// failed its root check.
    Loaded {
        /// Whether the tree still needs extending or revalidating
        stale: bool,
    },
    /// Root accepted by the contract.
    Validated,
    /// Validated tree written to the store.
    Persisted,
}
