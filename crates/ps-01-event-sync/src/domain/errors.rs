//! # Domain Errors
//!
//! Error types for Event Synchronization.
//!
//! Missing data sources are not errors: the service reports them as `None`
//! or an empty event list. The variants below are either transport failures
//! the pipeline absorbs, or invariant violations it must surface.

use shared_types::{BlockNumber, EncodingError, NetworkId};
use thiserror::Error;

/// Event synchronization error types.
#[derive(Debug, Clone, Error)]
pub enum EventSyncError {
    /// Node provider rejected or failed a request. The message is kept
    /// verbatim because it may carry an accepted-block hint.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Indexer query failed or reported indexing errors.
    #[error("Indexer error: {0}")]
    Indexer(String),

    /// Persisted store read or write failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Snapshot file could not be read, decoded or written.
    #[error("Snapshot error in {path}: {reason}")]
    Snapshot {
        /// File or collection name
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// A log or indexer record could not be decoded into an event.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Batched log fetch still had failing sub-ranges after the final retry.
    #[error("Failed to batch events: {failed} sub-ranges failed in [{from_block}, {to_block}]")]
    BatchAborted {
        /// First block of the requested range
        from_block: BlockNumber,
        /// Last block of the requested range
        to_block: BlockNumber,
        /// Sub-ranges that never succeeded
        failed: usize,
    },

    /// Deduplication changed the length of a snapshot.
    #[error("Duplicates was detected in {file} ({removed} events removed)")]
    DuplicatesDetected {
        /// Offending snapshot file
        file: String,
        /// Number of events the filter dropped
        removed: usize,
    },

    /// Deposit sequence is not contiguous.
    #[error("Leaf index gap in {collection}: expected {expected}, found {found}")]
    LeafGap {
        /// Collection name
        collection: String,
        /// First missing leaf index
        expected: u32,
        /// Leaf index found at that position
        found: u32,
    },

    /// Network id absent from the networks configuration.
    #[error("Unknown network: {0}")]
    UnknownNetwork(NetworkId),

    /// No contract configured for an instance or event kind.
    #[error("Unknown instance: {0}")]
    UnknownInstance(String),

    /// Configuration file could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EventSyncError {
    /// Whether this error signals an invariant violation rather than a
    /// transport failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EventSyncError::BatchAborted { .. }
                | EventSyncError::DuplicatesDetected { .. }
                | EventSyncError::LeafGap { .. }
        )
    }

    pub(crate) fn snapshot(path: impl Into<String>, reason: impl ToString) -> Self {
        EventSyncError::Snapshot {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<EncodingError> for EventSyncError {
    fn from(e: EncodingError) -> Self {
        EventSyncError::Decode(e.to_string())
    }
}
