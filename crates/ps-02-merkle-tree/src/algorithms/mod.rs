//! # Algorithms
//!
//! - `mimc` - MiMC-sponge permutation over the BN254 scalar field
//! - `hasher` - node hash abstraction used by the tree
//! - `merkle_tree` - fixed-depth incremental merkle tree

pub mod hasher;
pub mod merkle_tree;
pub mod mimc;

pub use hasher::{MimcSpongeHasher, TreeHasher};
pub use merkle_tree::MerkleTree;
pub use mimc::{multi_hash, zero_value, FIELD_MODULUS};
