//! # Tree Stores
//!
//! `FileTreeStore` keeps one `tree_{instance}.json` per instance, written via
//! temp file and rename. `InMemoryTreeStore` backs tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::InstanceKey;
use tracing::debug;

use crate::domain::{MerkleTreeError, TreeSnapshot};
use crate::ports::TreeStore;

/// File-backed tree store.
pub struct FileTreeStore {
    dir: PathBuf,
}

impl FileTreeStore {
    /// Store rooted at `dir` (created on first save).
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// File holding the tree of `instance`.
    pub fn tree_path(&self, instance: &InstanceKey) -> PathBuf {
        self.dir.join(format!("tree_{instance}.json"))
    }
}

#[async_trait]
impl TreeStore for FileTreeStore {
    async fn load(&self, instance: &InstanceKey) -> Result<Option<TreeSnapshot>, MerkleTreeError> {
        let path = self.tree_path(instance);
        let store_err = |e: String| MerkleTreeError::Store(format!("{}: {e}", path.display()));

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: TreeSnapshot =
                    serde_json::from_slice(&bytes).map_err(|e| store_err(e.to_string()))?;
                debug!(%instance, leaves = snapshot.leaf_count(), "Loaded persisted tree");
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_err(e.to_string())),
        }
    }

    async fn save(
        &self,
        instance: &InstanceKey,
        snapshot: &TreeSnapshot,
    ) -> Result<(), MerkleTreeError> {
        let path = self.tree_path(instance);
        let store_err = |e: String| MerkleTreeError::Store(format!("{}: {e}", path.display()));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| store_err(e.to_string()))?;
        let bytes = serde_json::to_vec(snapshot).map_err(|e| store_err(e.to_string()))?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, bytes)
            .await
            .map_err(|e| store_err(e.to_string()))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| store_err(e.to_string()))?;
        Ok(())
    }
}

/// In-memory tree store.
#[derive(Default)]
pub struct InMemoryTreeStore {
    trees: RwLock<HashMap<InstanceKey, TreeSnapshot>>,
    saves: Mutex<usize>,
}

impl InMemoryTreeStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

#[async_trait]
impl TreeStore for InMemoryTreeStore {
    async fn load(&self, instance: &InstanceKey) -> Result<Option<TreeSnapshot>, MerkleTreeError> {
        Ok(self.trees.read().get(instance).cloned())
    }

    async fn save(
        &self,
        instance: &InstanceKey,
        snapshot: &TreeSnapshot,
    ) -> Result<(), MerkleTreeError> {
        *self.saves.lock() += 1;
        self.trees.write().insert(instance.clone(), snapshot.clone());
        Ok(())
    }
}
