//! Two-to-one hash used for interior nodes.

use shared_types::U256;

use super::mimc;

/// Node hash of a fixed-depth merkle tree.
pub trait TreeHasher: Send + Sync + Clone {
    /// Parent of `left` and `right`.
    fn hash_pair(&self, left: &U256, right: &U256) -> U256;

    /// Value of an empty leaf.
    fn zero_value(&self) -> U256;
}

/// MiMC-sponge over BN254, matching the on-chain hasher of the pool contracts.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimcSpongeHasher;

impl TreeHasher for MimcSpongeHasher {
    fn hash_pair(&self, left: &U256, right: &U256) -> U256 {
        mimc::multi_hash(&[*left, *right])
    }

    fn zero_value(&self) -> U256 {
        mimc::zero_value()
    }
}
