//! # Incremental Merkle Tree
//!
//! Fixed-depth, append-only binary tree stored layer by layer.
//!
//! ## Layout
//!
//! - `layers[0]` holds the leaves in insertion order.
//! - `layers[l][i] = H(layers[l-1][2i], layers[l-1][2i+1])`, where a missing
//!   right child is replaced by `zeros[l-1]`.
//! - `zeros[0]` is the hasher's empty leaf; `zeros[l] = H(zeros[l-1], zeros[l-1])`.
//! - The root is `layers[levels][0]`, or `zeros[levels]` for an empty tree.

use shared_types::U256;

use super::hasher::{MimcSpongeHasher, TreeHasher};
use crate::domain::{MerklePath, MerkleTreeError, TreeSnapshot, MAX_LEVELS};

/// Append-only merkle tree of depth `levels`.
#[derive(Debug, Clone)]
pub struct MerkleTree<H: TreeHasher = MimcSpongeHasher> {
    levels: usize,
    zeros: Vec<U256>,
    layers: Vec<Vec<U256>>,
    hasher: H,
}

impl<H: TreeHasher> MerkleTree<H> {
    /// Build a tree over `leaves`.
    pub fn new(levels: usize, leaves: &[U256], hasher: H) -> Result<Self, MerkleTreeError> {
        if levels == 0 || levels > MAX_LEVELS {
            return Err(MerkleTreeError::InvalidLevels(levels));
        }

        let mut zeros = Vec::with_capacity(levels + 1);
        zeros.push(hasher.zero_value());
        for level in 1..=levels {
            let below = zeros[level - 1];
            zeros.push(hasher.hash_pair(&below, &below));
        }

        let mut tree = Self {
            levels,
            zeros,
            layers: vec![Vec::new(); levels + 1],
            hasher,
        };
        tree.bulk_insert(leaves)?;
        Ok(tree)
    }

    /// Restore a persisted tree, checking every stored node against its leaves.
    pub fn from_snapshot(snapshot: &TreeSnapshot, hasher: H) -> Result<Self, MerkleTreeError> {
        if snapshot.layers.len() != snapshot.levels + 1 {
            return Err(MerkleTreeError::CorruptTree(format!(
                "expected {} layers, found {}",
                snapshot.levels + 1,
                snapshot.layers.len()
            )));
        }
        let tree = Self::new(snapshot.levels, &snapshot.layers[0], hasher)?;
        if tree.layers != snapshot.layers {
            return Err(MerkleTreeError::CorruptTree(
                "stored nodes do not match the stored leaves".to_string(),
            ));
        }
        Ok(tree)
    }

    /// Persistable copy of the layers.
    pub fn to_snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            levels: self.levels,
            layers: self.layers.clone(),
        }
    }

    /// Tree depth.
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Maximum number of leaves.
    pub fn capacity(&self) -> usize {
        1usize << self.levels
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    /// True when no leaf has been inserted.
    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    /// Current root.
    pub fn root(&self) -> U256 {
        self.layers[self.levels]
            .first()
            .copied()
            .unwrap_or(self.zeros[self.levels])
    }

    /// Leaves in insertion order.
    pub fn elements(&self) -> &[U256] {
        &self.layers[0]
    }

    /// Empty-subtree value at each level.
    pub fn zeros(&self) -> &[U256] {
        &self.zeros
    }

    /// The tree's hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Append one leaf.
    pub fn insert(&mut self, leaf: U256) -> Result<(), MerkleTreeError> {
        self.bulk_insert(&[leaf])
    }

    /// Append `leaves`, rehashing only the nodes above the first new leaf.
    pub fn bulk_insert(&mut self, leaves: &[U256]) -> Result<(), MerkleTreeError> {
        if leaves.is_empty() {
            return Ok(());
        }
        let requested = self.len() + leaves.len();
        if requested > self.capacity() {
            return Err(MerkleTreeError::TreeFull {
                capacity: self.capacity(),
                requested,
            });
        }

        let first = self.len();
        self.layers[0].extend_from_slice(leaves);

        let mut start = first >> 1;
        for level in 1..=self.levels {
            let width = (self.layers[level - 1].len() + 1) >> 1;
            self.layers[level].truncate(start);
            for i in start..width {
                let left = self.layers[level - 1][2 * i];
                let right = self.layers[level - 1]
                    .get(2 * i + 1)
                    .copied()
                    .unwrap_or(self.zeros[level - 1]);
                let parent = self.hasher.hash_pair(&left, &right);
                self.layers[level].push(parent);
            }
            start >>= 1;
        }
        Ok(())
    }

    /// Position of `leaf`, if present.
    pub fn index_of(&self, leaf: &U256) -> Option<usize> {
        self.layers[0].iter().position(|e| e == leaf)
    }

    /// Authentication path of the leaf at `index`.
    pub fn path(&self, index: usize) -> Result<MerklePath, MerkleTreeError> {
        if index >= self.len() {
            return Err(MerkleTreeError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }

        let mut path_elements = Vec::with_capacity(self.levels);
        let mut path_indices = Vec::with_capacity(self.levels);
        let mut position = index;
        for level in 0..self.levels {
            path_indices.push((position & 1) as u8);
            let sibling = self.layers[level]
                .get(position ^ 1)
                .copied()
                .unwrap_or(self.zeros[level]);
            path_elements.push(sibling);
            position >>= 1;
        }

        Ok(MerklePath {
            path_elements,
            path_indices,
        })
    }

    /// Whether `path` proves `leaf` under the current root.
    pub fn verify_path(&self, leaf: U256, path: &MerklePath) -> bool {
        path.path_elements.len() == self.levels
            && path.compute_root(leaf, |l, r| self.hasher.hash_pair(l, r)) == self.root()
    }
}
