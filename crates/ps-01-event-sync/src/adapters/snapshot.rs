//! # Snapshot Codec
//!
//! Bundled snapshots are `{ "events": [...], "lastBlock": N }` documents,
//! pretty-printed with a trailing newline so that a read/write cycle is
//! byte-stable. Older snapshots are a bare event array; their `lastBlock`
//! is the last event's block, or a caller-supplied fallback when empty.
//!
//! At runtime snapshots are read from `{collection}.json.gz`; the offline
//! tool works on plain `{collection}.json` and packs them afterwards.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use shared_types::{BlockNumber, Event, EventSet};
use tracing::{debug, info};

use crate::domain::EventSyncError;
use crate::ports::SnapshotSource;

/// Plain snapshot extension.
pub const SNAPSHOT_EXT: &str = "json";

/// Compressed snapshot extension.
pub const PACKED_EXT: &str = "json.gz";

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Envelope(EventSet),
    Legacy(Vec<Event>),
}

/// Decode a snapshot document (envelope or legacy array).
pub fn decode_snapshot(
    bytes: &[u8],
    fallback_last_block: BlockNumber,
) -> Result<EventSet, serde_json::Error> {
    Ok(match serde_json::from_slice(bytes)? {
        SnapshotDocument::Envelope(set) => set,
        SnapshotDocument::Legacy(events) => {
            let last_block = events
                .last()
                .map(Event::block_number)
                .unwrap_or(fallback_last_block);
            EventSet::new(events, last_block)
        }
    })
}

/// Encode a snapshot as pretty JSON with a trailing newline.
pub fn encode_snapshot(set: &EventSet) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec_pretty(set)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Gunzip `bytes`.
pub fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Gzip `bytes` with the default level.
pub fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn is_packed(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a snapshot file; `None` when it does not exist.
///
/// `.gz` files are decompressed first.
pub async fn read_snapshot_file(
    path: &Path,
    fallback_last_block: BlockNumber,
) -> Result<Option<EventSet>, EventSyncError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(EventSyncError::snapshot(file_label(path), e)),
    };
    let bytes = if is_packed(path) {
        gunzip(&raw).map_err(|e| EventSyncError::snapshot(file_label(path), e))?
    } else {
        raw
    };
    decode_snapshot(&bytes, fallback_last_block)
        .map(Some)
        .map_err(|e| EventSyncError::snapshot(file_label(path), e))
}

/// Write a plain snapshot file atomically (temp file, then rename).
pub async fn write_snapshot_file(path: &Path, set: &EventSet) -> Result<(), EventSyncError> {
    let label = file_label(path);
    let bytes = encode_snapshot(set).map_err(|e| EventSyncError::snapshot(&label, e))?;
    write_atomic(path, &bytes)
        .await
        .map_err(|e| EventSyncError::snapshot(&label, e))?;
    debug!(file = %label, events = set.len(), last_block = set.last_block, "Wrote snapshot");
    Ok(())
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    tokio::fs::write(&temp, bytes).await?;
    tokio::fs::rename(&temp, path).await
}

/// Plain snapshot files in `dir`, sorted by name.
pub async fn list_snapshot_files(dir: &Path) -> Result<Vec<PathBuf>, EventSyncError> {
    let label = dir.display().to_string();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| EventSyncError::snapshot(&label, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| EventSyncError::snapshot(&label, e))?
    {
        let path = entry.path();
        let plain = path.extension().is_some_and(|ext| ext == SNAPSHOT_EXT);
        let is_record = path
            .file_stem()
            .is_some_and(|stem| stem == "lastEvents");
        if plain && !is_record {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Compress every plain snapshot in `dir` into a sibling `.json.gz`.
///
/// Returns the written paths.
pub async fn pack_snapshots(dir: &Path) -> Result<Vec<PathBuf>, EventSyncError> {
    let mut written = Vec::new();
    for path in list_snapshot_files(dir).await? {
        let label = file_label(&path);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| EventSyncError::snapshot(&label, e))?;
        let packed = gzip(&raw).map_err(|e| EventSyncError::snapshot(&label, e))?;
        let target = path.with_extension(PACKED_EXT);
        write_atomic(&target, &packed)
            .await
            .map_err(|e| EventSyncError::snapshot(&label, e))?;
        written.push(target);
    }
    info!(dir = %dir.display(), files = written.len(), "Packed snapshots");
    Ok(written)
}

/// Bundled snapshot directory.
pub struct SnapshotDir {
    dir: PathBuf,
}

impl SnapshotDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of a collection's plain snapshot.
    pub fn plain_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.{SNAPSHOT_EXT}"))
    }

    /// Path of a collection's compressed snapshot.
    pub fn packed_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.{PACKED_EXT}"))
    }
}

#[async_trait]
impl SnapshotSource for SnapshotDir {
    async fn load(&self, collection: &str) -> Result<Option<EventSet>, EventSyncError> {
        if let Some(set) = read_snapshot_file(&self.packed_path(collection), 0).await? {
            return Ok(Some(set));
        }
        read_snapshot_file(&self.plain_path(collection), 0).await
    }
}
