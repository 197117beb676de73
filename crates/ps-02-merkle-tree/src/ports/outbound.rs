//! # Outbound Ports
//!
//! Tree persistence, the pool contract's root history and the prover.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{InstanceKey, U256};

use crate::domain::{MerkleTreeError, TreeSnapshot, WithdrawalWitness};

/// Persisted trees - outbound port.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Last saved tree of `instance`, if any.
    async fn load(&self, instance: &InstanceKey) -> Result<Option<TreeSnapshot>, MerkleTreeError>;

    /// Replace the saved tree of `instance`.
    async fn save(
        &self,
        instance: &InstanceKey,
        snapshot: &TreeSnapshot,
    ) -> Result<(), MerkleTreeError>;
}

/// Read-only view of one pool contract - outbound port.
#[async_trait]
pub trait PoolContract: Send + Sync {
    /// Number of deposits the contract has accepted.
    async fn next_index(&self) -> Result<u32, MerkleTreeError>;

    /// Whether `root` is in the contract's root history.
    async fn is_known_root(&self, root: &U256) -> Result<bool, MerkleTreeError>;
}

/// Zero-knowledge prover - outbound port.
#[async_trait]
pub trait Prover: Send + Sync {
    /// Load circuit and proving key.
    async fn initialize(&self) -> Result<(), MerkleTreeError>;

    /// Encoded proof for `witness`.
    async fn prove(&self, witness: &WithdrawalWitness) -> Result<String, MerkleTreeError>;
}

// =============================================================================
// MOCKS
// =============================================================================

/// Mock contract with an explicit root history.
#[derive(Default)]
pub struct MockPoolContract {
    /// Roots the contract accepts.
    pub known_roots: Mutex<HashSet<U256>>,
    /// Reported deposit count.
    pub next_index: Mutex<u32>,
    /// Accept every root.
    pub accept_all: AtomicBool,
    /// Roots queried, in call order.
    pub queried: Mutex<Vec<U256>>,
}

impl MockPoolContract {
    /// Contract that recognises every root.
    pub fn accepting() -> Self {
        let contract = Self::default();
        contract.accept_all.store(true, Ordering::SeqCst);
        contract
    }

    /// Contract that recognises only `roots`.
    pub fn with_roots(roots: impl IntoIterator<Item = U256>) -> Self {
        let contract = Self::default();
        contract.known_roots.lock().extend(roots);
        contract
    }
}

#[async_trait]
impl PoolContract for MockPoolContract {
    async fn next_index(&self) -> Result<u32, MerkleTreeError> {
        Ok(*self.next_index.lock())
    }

    async fn is_known_root(&self, root: &U256) -> Result<bool, MerkleTreeError> {
        self.queried.lock().push(*root);
        Ok(self.accept_all.load(Ordering::SeqCst) || self.known_roots.lock().contains(root))
    }
}

/// Mock prover recording every witness.
#[derive(Default)]
pub struct MockProver {
    /// Set by `initialize`.
    pub initialized: AtomicBool,
    /// Fail `initialize`.
    pub fail_init: bool,
    /// Witnesses received by `prove`.
    pub witnesses: Mutex<Vec<WithdrawalWitness>>,
}

#[async_trait]
impl Prover for MockProver {
    async fn initialize(&self) -> Result<(), MerkleTreeError> {
        if self.fail_init {
            return Err(MerkleTreeError::Prover("proving key unavailable".to_string()));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn prove(&self, witness: &WithdrawalWitness) -> Result<String, MerkleTreeError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(MerkleTreeError::Prover("prover not initialized".to_string()));
        }
        self.witnesses.lock().push(witness.clone());
        Ok(format!("0x{:0>512}", self.witnesses.lock().len()))
    }
}
