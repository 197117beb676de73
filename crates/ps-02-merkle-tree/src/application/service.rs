//! # Merkle Tree Service
//!
//! Keeps one tree per instance in step with the deposit history.
//!
//! A build syncs deposits, extends the cached or persisted tree with the new
//! commitments (or rebuilds it when the stored leaves are not a prefix of
//! the history), compares the leaf count with the contract's `nextIndex`,
//! asks the contract whether the root is known, and only then persists the
//! tree.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use ps_01_event_sync::{EventSyncApi, EventSyncError};
use ps_telemetry::{
    metric_inc, time_histogram, DEPOSIT_SHORTFALL, ROOT_MISMATCHES, TREE_BUILD_DURATION,
    TREE_LEAVES,
};
use shared_types::{parse_field_element, to_fixed_hex, EventKind, EventSet, InstanceKey, U256};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::algorithms::{MerkleTree, MimcSpongeHasher, TreeHasher};
use crate::config::TreeConfig;
use crate::domain::{MerkleTreeError, TreeState};
use crate::ports::{MerkleTreeApi, PoolContract, TreeStore};

/// Merkle tree construction for one instance.
pub struct MerkleTreeService<H: TreeHasher = MimcSpongeHasher> {
    instance: InstanceKey,
    config: TreeConfig,
    hasher: H,
    events: Arc<dyn EventSyncApi>,
    contract: Arc<dyn PoolContract>,
    store: Arc<dyn TreeStore>,
    tree: Mutex<Option<MerkleTree<H>>>,
    state: RwLock<TreeState>,
}

impl MerkleTreeService<MimcSpongeHasher> {
    /// Service hashing with MiMC-sponge.
    pub fn new(
        instance: InstanceKey,
        config: TreeConfig,
        events: Arc<dyn EventSyncApi>,
        contract: Arc<dyn PoolContract>,
        store: Arc<dyn TreeStore>,
    ) -> Self {
        Self::with_hasher(instance, config, events, contract, store, MimcSpongeHasher)
    }
}

impl<H: TreeHasher + 'static> MerkleTreeService<H> {
    /// Service with a custom node hash.
    pub fn with_hasher(
        instance: InstanceKey,
        config: TreeConfig,
        events: Arc<dyn EventSyncApi>,
        contract: Arc<dyn PoolContract>,
        store: Arc<dyn TreeStore>,
        hasher: H,
    ) -> Self {
        Self {
            instance,
            config,
            hasher,
            events,
            contract,
            store,
            tree: Mutex::new(None),
            state: RwLock::new(TreeState::Unbuilt),
        }
    }

    /// Instance served.
    pub fn instance(&self) -> &InstanceKey {
        &self.instance
    }

    fn set_state(&self, state: TreeState) {
        debug!(instance = %self.instance, ?state, "Tree state");
        *self.state.write() = state;
    }

    async fn load_persisted(&self) -> Result<Option<MerkleTree<H>>, MerkleTreeError> {
        match self.store.load(&self.instance).await? {
            Some(snapshot) => MerkleTree::from_snapshot(&snapshot, self.hasher.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Tree to extend: in memory first, then the store. A persisted tree
    /// that fails its own consistency check is dropped and rebuilt.
    async fn base_tree(
        &self,
        cached: Option<MerkleTree<H>>,
    ) -> Result<Option<MerkleTree<H>>, MerkleTreeError> {
        if cached.is_some() {
            return Ok(cached);
        }
        match self.load_persisted().await {
            Ok(tree) => Ok(tree),
            Err(e @ MerkleTreeError::CorruptTree(_)) => {
                error!(instance = %self.instance, error = %e, "Discarding persisted tree");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn extend_or_rebuild(
        &self,
        base: Option<MerkleTree<H>>,
        commitments: &[U256],
    ) -> Result<MerkleTree<H>, MerkleTreeError> {
        if let Some(mut tree) = base {
            let known = tree.len();
            if tree.levels() == self.config.levels && commitments.starts_with(tree.elements()) {
                tree.bulk_insert(&commitments[known..])?;
                debug!(
                    instance = %self.instance,
                    appended = commitments.len() - known,
                    "Extended tree"
                );
                return Ok(tree);
            }
            warn!(
                instance = %self.instance,
                tree_leaves = known,
                deposits = commitments.len(),
                "Tree diverges from deposit history, rebuilding"
            );
        }
        MerkleTree::new(self.config.levels, commitments, self.hasher.clone())
    }

    /// Compare the synced deposit count with the contract's. Returns the
    /// number of deposits missing from the history.
    async fn deposit_shortfall(&self, synced: usize, label: &str) -> u32 {
        let accepted = match self.contract.next_index().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(instance = %self.instance, error = %e, "nextIndex unavailable");
                return 0;
            }
        };
        let synced = u32::try_from(synced).unwrap_or(u32::MAX);
        let missing = accepted.saturating_sub(synced);
        DEPOSIT_SHORTFALL
            .with_label_values(&[label])
            .set(f64::from(missing));
        if missing > 0 {
            error!(
                instance = %self.instance,
                first_missing = synced,
                last_missing = accepted - 1,
                missing,
                "Deposit history is behind the contract"
            );
        } else if synced > accepted {
            debug!(
                instance = %self.instance,
                synced,
                accepted,
                "Contract read lags the synced history"
            );
        }
        missing
    }
}

/// Commitments of a deposit set, checking each sits at its leaf index.
pub fn commitments_of(
    instance: &InstanceKey,
    deposits: &EventSet,
) -> Result<Vec<U256>, MerkleTreeError> {
    let mut commitments = Vec::with_capacity(deposits.len());
    let sequence = deposits.events.iter().filter_map(|e| e.as_deposit());
    for (position, deposit) in sequence.enumerate() {
        if deposit.leaf_index as usize != position {
            return Err(EventSyncError::LeafGap {
                collection: instance.collection_name(EventKind::Deposit),
                expected: position as u32,
                found: deposit.leaf_index,
            }
            .into());
        }
        commitments.push(parse_field_element(&deposit.commitment)?);
    }
    Ok(commitments)
}

#[async_trait]
impl<H: TreeHasher + 'static> MerkleTreeApi for MerkleTreeService<H> {
    type Hasher = H;

    async fn get_tree(&self) -> Result<Option<MerkleTree<H>>, MerkleTreeError> {
        let tree = self.load_persisted().await?;
        if tree.is_some() && self.state() == TreeState::Unbuilt {
            self.set_state(TreeState::Loaded { stale: true });
        }
        Ok(tree)
    }

    async fn build_tree(&self) -> Result<MerkleTree<H>, MerkleTreeError> {
        let mut guard = self.tree.lock().await;
        let _timer = time_histogram!(TREE_BUILD_DURATION);

        let deposits = self.events.update_events(EventKind::Deposit, None).await?;
        let commitments = commitments_of(&self.instance, &deposits)?;

        let base = self.base_tree(guard.take()).await?;
        let tree = self.extend_or_rebuild(base, &commitments)?;
        self.set_state(TreeState::Loaded { stale: false });

        let label = self.instance.to_string();
        TREE_LEAVES
            .with_label_values(&[label.as_str()])
            .set(tree.len() as f64);
        let missing = self.deposit_shortfall(tree.len(), &label).await;

        let root = tree.root();
        *guard = Some(tree.clone());

        let known = match self.contract.is_known_root(&root).await {
            Ok(known) => known,
            Err(e) => {
                self.set_state(TreeState::Loaded { stale: true });
                return Err(e);
            }
        };
        if !known {
            metric_inc!(ROOT_MISMATCHES);
            self.set_state(TreeState::Loaded { stale: true });
            error!(
                instance = %self.instance,
                root = %to_fixed_hex(&root),
                leaves = tree.len(),
                missing,
                last_block = deposits.last_block,
                "Computed root is not known by the contract"
            );
            return Err(MerkleTreeError::UnknownRoot {
                root: to_fixed_hex(&root),
                instance: label,
            });
        }
        self.set_state(TreeState::Validated);

        self.store.save(&self.instance, &tree.to_snapshot()).await?;
        self.set_state(TreeState::Persisted);

        info!(
            instance = %self.instance,
            leaves = tree.len(),
            root = %to_fixed_hex(&root),
            "Tree built"
        );
        Ok(tree)
    }

    async fn anonymity_set(&self) -> Result<u32, MerkleTreeError> {
        self.contract.next_index().await
    }

    fn state(&self) -> TreeState {
        *self.state.read()
    }
}
