//! # Offline Snapshot Engine
//!
//! Batch callers of the fetch pipeline: refresh snapshot files from the
//! node, verify that every snapshot survives its kind's filter unchanged,
//! and report what is cached.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ps_telemetry::{LEAF_GAPS, SNAPSHOT_DUPLICATES};
use serde::Serialize;
use shared_types::{BlockNumber, EventKind, EventSet, InstanceKey, NetworkId};
use tracing::{error, info, warn};

use super::fetch::RpcFetcher;
use crate::adapters::snapshot::{list_snapshot_files, read_snapshot_file, write_snapshot_file};
use crate::algorithms::merge_events;
use crate::config::{ContractBinding, NetworksConfig, SyncConfig};
use crate::domain::{filter_events, first_leaf_mismatch, BlockRange, EventSyncError, LogFilter};
use crate::ports::LogProviderFactory;

/// Token and event filter of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSelection {
    /// Lower-case currency to restrict to
    pub token: Option<String>,
    /// Event kind to restrict to
    pub kind: Option<EventKind>,
}

impl SyncSelection {
    /// Interpret optional positional arguments: each one is an event name if
    /// it parses as one, otherwise a token symbol. Later arguments win.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Self {
        let mut selection = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            match arg.parse::<EventKind>() {
                Ok(kind) => selection.kind = Some(kind),
                Err(_) => selection.token = Some(arg.to_lowercase()),
            }
        }
        selection
    }

    fn includes_kind(&self, kind: EventKind) -> bool {
        self.kind.map_or(true, |selected| selected == kind)
    }

    fn includes_token(&self, currency: &str) -> bool {
        self.token
            .as_deref()
            .map_or(true, |token| token.eq_ignore_ascii_case(currency))
    }
}

/// Outcome of refreshing one snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Collection (file stem)
    pub collection: String,
    /// Events before the run
    pub before: usize,
    /// Events after the run
    pub after: usize,
    /// Covered block after the run
    pub last_block: BlockNumber,
}

/// Refreshes snapshot files in one directory.
pub struct SnapshotSync {
    networks: NetworksConfig,
    config: SyncConfig,
    factory: Arc<dyn LogProviderFactory>,
    dir: PathBuf,
}

impl SnapshotSync {
    pub fn new(
        networks: NetworksConfig,
        config: SyncConfig,
        factory: Arc<dyn LogProviderFactory>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            networks,
            config,
            factory,
            dir: dir.into(),
        }
    }

    fn snapshot_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    /// Refresh every selected snapshot of a network.
    pub async fn sync_network(
        &self,
        network_id: NetworkId,
        selection: &SyncSelection,
    ) -> Result<Vec<SyncReport>, EventSyncError> {
        let network = self.networks.network(network_id)?;
        let provider = self.factory.provider_for(network_id, network)?;
        let fetcher = RpcFetcher::new(provider, self.config.clone(), network_id);

        let mut reports = Vec::new();
        for key in self.networks.instances(network_id)? {
            if !selection.includes_token(&key.currency) {
                continue;
            }
            for kind in [EventKind::Deposit, EventKind::Withdrawal] {
                if !selection.includes_kind(kind) {
                    continue;
                }
                let binding = self.networks.binding(&key, kind)?;
                reports.push(self.sync_collection(&fetcher, &key, kind, &binding).await?);
            }
        }

        // Notes come from one network-wide contract.
        let notes_selected = selection.kind == Some(EventKind::EncryptedNote)
            || (selection.kind.is_none() && selection.token.is_none());
        if notes_selected {
            let key = InstanceKey::new(network_id, &network.native_currency, "");
            match network.binding(&key, EventKind::EncryptedNote) {
                Some(binding) => reports.push(
                    self.sync_collection(&fetcher, &key, EventKind::EncryptedNote, &binding)
                        .await?,
                ),
                None => warn!(network_id, "No echoer contract configured, skipping notes"),
            }
        }
        Ok(reports)
    }

    async fn sync_collection(
        &self,
        fetcher: &RpcFetcher,
        key: &InstanceKey,
        kind: EventKind,
        binding: &ContractBinding,
    ) -> Result<SyncReport, EventSyncError> {
        let collection = key.collection_name(kind);
        let path = self.snapshot_path(&collection);
        let fallback = binding.deployed_block.saturating_sub(1);

        let saved = read_snapshot_file(&path, fallback).await?;
        let before = saved.as_ref().map_or(0, EventSet::len);
        let from_block = saved
            .as_ref()
            .map_or(binding.deployed_block, |set| set.last_block + 1)
            .max(binding.deployed_block);

        let filter = LogFilter::new(
            binding.address.clone(),
            kind,
            BlockRange::new(from_block, from_block),
        );
        let fresh = fetcher.fetch_from(&filter, from_block).await?;
        let outcome = merge_events(kind, saved, fresh, from_block);

        if let Some(expected) = outcome.first_gap {
            warn!(collection = %collection, expected, "Deposit sequence truncated at missing leaf index");
            LEAF_GAPS.inc();
        }
        if outcome.changed || !path.exists() {
            write_snapshot_file(&path, &outcome.set).await?;
        }

        info!(
            collection = %collection,
            before,
            after = outcome.set.len(),
            last_block = outcome.set.last_block,
            "Snapshot synced"
        );
        Ok(SyncReport {
            collection,
            before,
            after: outcome.set.len(),
            last_block: outcome.set.last_block,
        })
    }
}

/// Event kind of a collection name (`deposits_...`, `withdrawals_...`,
/// `encrypted_notes_...`).
pub fn kind_of_collection(collection: &str) -> Option<EventKind> {
    EventKind::ALL.into_iter().find(|kind| {
        collection
            .strip_prefix(kind.collection_prefix())
            .is_some_and(|rest| rest.starts_with('_'))
    })
}

fn collection_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Result of verifying one snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    /// File name
    pub file: String,
    /// Event count
    pub events: usize,
}

/// Check that every plain snapshot in `dir` is unchanged by its filter.
///
/// The first file that loses events fails the run with
/// `DuplicatesDetected`; a deposit file that is internally out of sequence
/// fails with `LeafGap`.
pub async fn verify_snapshots(dir: &Path) -> Result<Vec<VerifyReport>, EventSyncError> {
    let mut reports = Vec::new();
    for path in list_snapshot_files(dir).await? {
        let collection = collection_of(&path);
        let Some(kind) = kind_of_collection(&collection) else {
            warn!(file = %path.display(), "Skipping file with unknown collection name");
            continue;
        };
        let Some(set) = read_snapshot_file(&path, 0).await? else {
            continue;
        };
        let file = file_name(&path);
        let total = set.len();
        let filtered = filter_events(kind, set.events.clone());

        if filtered.events.len() != total {
            error!(file = %file, removed = filtered.removed, "Duplicates detected in snapshot");
            SNAPSHOT_DUPLICATES.inc();
            return Err(EventSyncError::DuplicatesDetected {
                file,
                removed: filtered.removed,
            });
        }
        if kind == EventKind::Deposit {
            if let Some((expected, found)) = first_leaf_mismatch(&set.events) {
                error!(file = %file, expected, found, "Deposit snapshot out of sequence");
                LEAF_GAPS.inc();
                return Err(EventSyncError::LeafGap {
                    collection,
                    expected,
                    found,
                });
            }
        }
        info!(file = %file, events = total, "Snapshot verified");
        reports.push(VerifyReport { file, events: total });
    }
    Ok(reports)
}

/// Cached events of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStatus {
    /// Instance the collection belongs to
    pub instance: String,
    /// Event kind
    pub kind: EventKind,
    /// Collection name
    pub collection: String,
    /// Cached events (0 when no snapshot exists)
    pub events: usize,
    /// Covered block, if a snapshot exists
    pub last_block: Option<BlockNumber>,
}

/// Counts and covered block for every instance and kind of the given
/// networks (all configured networks when `network_ids` is empty).
pub async fn snapshot_status(
    dir: &Path,
    networks: &NetworksConfig,
    network_ids: &[NetworkId],
) -> Result<Vec<CollectionStatus>, EventSyncError> {
    let ids: Vec<NetworkId> = if network_ids.is_empty() {
        networks.networks.keys().copied().collect()
    } else {
        network_ids.to_vec()
    };

    let mut statuses = Vec::new();
    for network_id in ids {
        let network = networks.network(network_id)?;
        let mut entries: Vec<(InstanceKey, EventKind)> = networks
            .instances(network_id)?
            .into_iter()
            .flat_map(|key| {
                [EventKind::Deposit, EventKind::Withdrawal]
                    .into_iter()
                    .map(move |kind| (key.clone(), kind))
            })
            .collect();
        if network.echoer_address.is_some() {
            entries.push((
                InstanceKey::new(network_id, &network.native_currency, ""),
                EventKind::EncryptedNote,
            ));
        }

        for (key, kind) in entries {
            let collection = key.collection_name(kind);
            let set = read_snapshot_file(&dir.join(format!("{collection}.json")), 0).await?;
            statuses.push(CollectionStatus {
                instance: match kind {
                    EventKind::EncryptedNote => network_id.to_string(),
                    _ => key.to_string(),
                },
                kind,
                collection,
                events: set.as_ref().map_or(0, EventSet::len),
                last_block: set.map(|s| s.last_block),
            });
        }
    }
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockLogProvider, StaticSourceFactory};
    use shared_types::{DepositEvent, Event, WithdrawalEvent};

    const NETWORKS: &str = r#"{
      "networks": {
        "1": {
          "rpcUrl": "http://localhost:8545",
          "deployedBlock": 10,
          "nativeCurrency": "eth",
          "echoerAddress": "0xecho",
          "tokens": {
            "eth": {"symbol": "ETH", "decimals": 18, "instanceAddress": {"0.1": "0xa"}},
            "dai": {"symbol": "DAI", "decimals": 18, "instanceAddress": {"100": "0xd"}}
          }
        }
      }
    }"#;

    fn deposit(leaf_index: u32, block_number: u64) -> Event {
        Event::Deposit(DepositEvent {
            timestamp: 1,
            commitment: format!("0x{:064x}", leaf_index + 1),
            block_number,
            transaction_hash: format!("0x{:064x}", block_number),
            leaf_index,
        })
    }

    fn withdrawal(nullifier: u64, block_number: u64) -> Event {
        Event::Withdrawal(WithdrawalEvent {
            to: "0x01".to_string(),
            fee: "0".to_string(),
            block_number,
            nullifier_hash: format!("0x{:064x}", nullifier),
            transaction_hash: format!("0x{:064x}", block_number),
        })
    }

    #[test]
    fn test_selection_later_argument_wins() {
        let selection = SyncSelection::from_args(&["eth", "deposit"]);
        assert_eq!(selection.token.as_deref(), Some("eth"));
        assert_eq!(selection.kind, Some(EventKind::Deposit));

        let selection = SyncSelection::from_args(&["withdrawals", "deposits"]);
        assert_eq!(selection.kind, Some(EventKind::Deposit));
        assert!(selection.token.is_none());

        let selection = SyncSelection::from_args(&["DAI", "eth"]);
        assert_eq!(selection.token.as_deref(), Some("eth"));
    }

    #[test]
    fn test_kind_of_collection() {
        assert_eq!(kind_of_collection("deposits_1_eth_0.1"), Some(EventKind::Deposit));
        assert_eq!(
            kind_of_collection("encrypted_notes_1"),
            Some(EventKind::EncryptedNote)
        );
        assert_eq!(kind_of_collection("lastEvents"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_network_writes_selected_files() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockLogProvider::new(
            vec![deposit(0, 12), deposit(1, 20)],
            50,
        ));
        let sync = SnapshotSync::new(
            NetworksConfig::from_json(NETWORKS).unwrap(),
            SyncConfig::for_testing(),
            Arc::new(StaticSourceFactory::new(provider)),
            dir.path(),
        );

        let reports = sync
            .sync_network(1, &SyncSelection::from_args(&["eth", "deposit"]))
            .await
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].collection, "deposits_1_eth_0.1");
        assert_eq!(reports[0].after, 2);
        assert!(dir.path().join("deposits_1_eth_0.1.json").exists());
        assert!(!dir.path().join("deposits_1_dai_100.json").exists());

        // Second run appends nothing.
        let again = sync
            .sync_network(1, &SyncSelection::from_args(&["eth", "deposit"]))
            .await
            .unwrap();
        assert_eq!(again[0].before, 2);
        assert_eq!(again[0].after, 2);
        assert_eq!(again[0].last_block, 20);
    }

    #[tokio::test]
    async fn test_verify_detects_duplicate_nullifier() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot_file(
            &dir.path().join("deposits_1_eth_0.1.json"),
            &EventSet::new(vec![deposit(0, 12), deposit(1, 20)], 20),
        )
        .await
        .unwrap();
        write_snapshot_file(
            &dir.path().join("withdrawals_1_eth_0.1.json"),
            &EventSet::new(vec![withdrawal(1, 30), withdrawal(1, 31)], 31),
        )
        .await
        .unwrap();

        let err = verify_snapshots(dir.path()).await.unwrap_err();
        match err {
            EventSyncError::DuplicatesDetected { file, removed } => {
                assert_eq!(file, "withdrawals_1_eth_0.1.json");
                assert_eq!(removed, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_verify_accepts_clean_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot_file(
            &dir.path().join("deposits_1_eth_0.1.json"),
            &EventSet::new(vec![deposit(0, 12), deposit(1, 20)], 20),
        )
        .await
        .unwrap();
        let reports = verify_snapshots(dir.path()).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].events, 2);
    }

    #[tokio::test]
    async fn test_status_lists_every_collection() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot_file(
            &dir.path().join("deposits_1_eth_0.1.json"),
            &EventSet::new(vec![deposit(0, 12)], 40),
        )
        .await
        .unwrap();
        let networks = NetworksConfig::from_json(NETWORKS).unwrap();
        let statuses = snapshot_status(dir.path(), &networks, &[]).await.unwrap();

        // Two instances times two kinds, plus the network's notes.
        assert_eq!(statuses.len(), 5);
        let eth = statuses
            .iter()
            .find(|s| s.collection == "deposits_1_eth_0.1")
            .unwrap();
        assert_eq!(eth.events, 1);
        assert_eq!(eth.last_block, Some(40));
        assert!(statuses
            .iter()
            .any(|s| s.collection == "encrypted_notes_1" && s.last_block.is_none()));
    }
}
