use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{BlockNumber, Event, IndexedField};
use tracing::{debug, info};

use super::memory_store::{lookup, ordered, upsert, Collection};
use crate::domain::EventSyncError;
use crate::ports::EventStore;

const LAST_EVENTS_FILE: &str = "lastEvents.json";

/// File-backed event store.
///
/// Each collection lives in `{dir}/{collection}.json` as an ordered event
/// array; covered blocks live in `{dir}/lastEvents.json`. Collections are
/// loaded lazily and every write goes through a temp file and rename.
pub struct FileEventStore {
    dir: PathBuf,
    collections: RwLock<HashMap<String, Collection>>,
    last_blocks: RwLock<Option<BTreeMap<String, BlockNumber>>>,
}

impl FileEventStore {
    /// Create a store rooted at `dir` (created on first write).
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        info!(dir = %dir.display(), "Opening file event store");
        Self {
            dir,
            collections: RwLock::new(HashMap::new()),
            last_blocks: RwLock::new(None),
        }
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    async fn ensure_loaded(&self, collection: &str) -> Result<(), EventSyncError> {
        if self.collections.read().contains_key(collection) {
            return Ok(());
        }
        let path = self.collection_path(collection);
        let events: Vec<Event> = read_json(&path).await?.unwrap_or_default();
        debug!(collection, count = events.len(), "Loaded collection from disk");

        let mut loaded = Collection::new();
        upsert(&mut loaded, &events);
        self.collections
            .write()
            .entry(collection.to_string())
            .or_insert(loaded);
        Ok(())
    }

    async fn ensure_last_blocks(&self) -> Result<(), EventSyncError> {
        if self.last_blocks.read().is_some() {
            return Ok(());
        }
        let path = self.dir.join(LAST_EVENTS_FILE);
        let records: BTreeMap<String, BlockNumber> = read_json(&path).await?.unwrap_or_default();
        let mut guard = self.last_blocks.write();
        if guard.is_none() {
            *guard = Some(records);
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for FileEventStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<Event>, EventSyncError> {
        self.ensure_loaded(collection).await?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(ordered)
            .unwrap_or_default())
    }

    async fn get_from_index(
        &self,
        collection: &str,
        field: IndexedField,
        key: &str,
    ) -> Result<Option<Event>, EventSyncError> {
        self.ensure_loaded(collection).await?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| lookup(c, field, key)))
    }

    async fn put_many(&self, collection: &str, events: &[Event]) -> Result<(), EventSyncError> {
        self.ensure_loaded(collection).await?;
        let snapshot = {
            let mut guard = self.collections.write();
            let entry = guard.entry(collection.to_string()).or_default();
            if upsert(entry, events) == 0 {
                return Ok(());
            }
            ordered(entry)
        };
        write_json(&self.dir, &self.collection_path(collection), &snapshot).await
    }

    async fn put_last_block(
        &self,
        collection: &str,
        block: BlockNumber,
    ) -> Result<(), EventSyncError> {
        self.ensure_last_blocks().await?;
        let snapshot = {
            let mut guard = self.last_blocks.write();
            let records = guard.get_or_insert_with(BTreeMap::new);
            if records.get(collection) == Some(&block) {
                return Ok(());
            }
            records.insert(collection.to_string(), block);
            records.clone()
        };
        write_json(&self.dir, &self.dir.join(LAST_EVENTS_FILE), &snapshot).await
    }

    async fn get_last_block(&self, collection: &str) -> Result<Option<BlockNumber>, EventSyncError> {
        self.ensure_last_blocks().await?;
        Ok(self
            .last_blocks
            .read()
            .as_ref()
            .and_then(|records| records.get(collection).copied()))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, EventSyncError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| EventSyncError::Store(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(EventSyncError::Store(format!("{}: {e}", path.display()))),
    }
}

async fn write_json<T: serde::Serialize>(
    dir: &Path,
    path: &Path,
    value: &T,
) -> Result<(), EventSyncError> {
    let store_err = |e: std::io::Error| EventSyncError::Store(format!("{}: {e}", path.display()));

    tokio::fs::create_dir_all(dir).await.map_err(store_err)?;
    let bytes =
        serde_json::to_vec(value).map_err(|e| EventSyncError::Store(e.to_string()))?;

    // Write atomically via temp file
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, bytes).await.map_err(store_err)?;
    tokio::fs::rename(&temp_path, path).await.map_err(store_err)?;
    Ok(())
}
