//! # Withdrawal Preparation
//!
//! Builds and validates the instance tree, refuses spent notes, locates the
//! note's leaf and hands the witness to an initialized prover.

use std::sync::Arc;

use ps_01_event_sync::EventSyncApi;
use shared_types::{to_fixed_hex, EventKind, EventQuery, IndexedField};
use tracing::{info, warn};

use crate::algorithms::{MimcSpongeHasher, TreeHasher};
use crate::domain::{MerkleTreeError, PreparedWithdrawal, WithdrawalRequest, WithdrawalWitness};
use crate::ports::{MerkleTreeApi, Prover};

/// A prover that has loaded its circuit and key.
///
/// Obtained only through `initialize`, so a context in hand is always ready.
#[derive(Clone)]
pub struct ProverContext {
    prover: Arc<dyn Prover>,
}

impl ProverContext {
    /// Initialize `prover` and wrap it.
    pub async fn initialize(prover: Arc<dyn Prover>) -> Result<Self, MerkleTreeError> {
        prover.initialize().await?;
        info!("Prover initialized");
        Ok(Self { prover })
    }

    /// The ready prover.
    pub fn prover(&self) -> &dyn Prover {
        self.prover.as_ref()
    }
}

/// Turns a note into a proof and `withdraw` arguments for one instance.
pub struct WithdrawalPreparer<H: TreeHasher = MimcSpongeHasher> {
    trees: Arc<dyn MerkleTreeApi<Hasher = H>>,
    events: Arc<dyn EventSyncApi>,
}

impl<H: TreeHasher + 'static> WithdrawalPreparer<H> {
    /// Preparer over the instance's tree and event services.
    pub fn new(trees: Arc<dyn MerkleTreeApi<Hasher = H>>, events: Arc<dyn EventSyncApi>) -> Self {
        Self { trees, events }
    }

    /// Whether `request`'s nullifier already appears in the withdrawal history.
    pub async fn is_spent(&self, request: &WithdrawalRequest) -> Result<bool, MerkleTreeError> {
        let query = EventQuery::new(
            IndexedField::NullifierHash,
            to_fixed_hex(&request.nullifier_hash),
        );
        Ok(self
            .events
            .find_event(EventKind::Withdrawal, &query)
            .await?
            .is_some())
    }

    /// Build the tree, check the note is unspent and produce the proof.
    pub async fn prepare(
        &self,
        request: &WithdrawalRequest,
        context: &ProverContext,
    ) -> Result<PreparedWithdrawal, MerkleTreeError> {
        let tree = self.trees.build_tree().await?;

        if self.is_spent(request).await? {
            let nullifier = to_fixed_hex(&request.nullifier_hash);
            warn!(instance = %request.instance, %nullifier, "Refusing spent note");
            return Err(MerkleTreeError::NullifierSpent(nullifier));
        }

        let leaf_index = tree
            .index_of(&request.commitment)
            .ok_or_else(|| MerkleTreeError::LeafNotFound(to_fixed_hex(&request.commitment)))?;
        let path = tree.path(leaf_index)?;

        let witness = WithdrawalWitness {
            root: tree.root(),
            nullifier_hash: request.nullifier_hash,
            recipient: request.recipient,
            relayer: request.relayer,
            fee: request.fee,
            refund: request.refund,
            nullifier: request.nullifier,
            secret: request.secret,
            path_elements: path.path_elements,
            path_indices: path.path_indices,
        };
        let proof = context.prover().prove(&witness).await?;

        info!(instance = %request.instance, leaf_index, "Withdrawal prepared");
        Ok(PreparedWithdrawal {
            proof,
            args: witness.public_args(),
            leaf_index,
        })
    }
}
