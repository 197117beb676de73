//! # Event Sync Configuration
//!
//! Pipeline tuning (`SyncConfig`) and the per-network contract registry
//! (`NetworksConfig`) loaded from a JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::{BlockNumber, EventKind, InstanceKey, NetworkId};

use crate::algorithms::RetryPolicy;
use crate::domain::{
    EventSyncError, DEFAULT_BATCH_SIZE, DEFAULT_BLOCK_SYNC_INTERVAL, DEFAULT_INDEXER_PAGE_SIZE,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS, DEFAULT_STAGGER_MS,
};

/// Environment variable naming the networks configuration file.
pub const NETWORKS_CONFIG_ENV: &str = "PS_NETWORKS_CONFIG";

/// Fetch pipeline configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Concurrent sub-range requests per batch.
    pub batch_size: usize,

    /// Calls per sub-range before it is reported failed.
    pub max_attempts: u32,

    /// Linear backoff unit in milliseconds.
    pub retry_delay_ms: u64,

    /// Delay between request launches inside a batch, in milliseconds.
    pub stagger_ms: u64,

    /// Ranges at least this many blocks long are fetched in batches.
    pub block_sync_interval: u64,

    /// Indexer page size.
    pub indexer_page_size: usize,

    /// HTTP request timeout in seconds.
    pub http_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            stagger_ms: DEFAULT_STAGGER_MS,
            block_sync_interval: DEFAULT_BLOCK_SYNC_INTERVAL,
            indexer_page_size: DEFAULT_INDEXER_PAGE_SIZE,
            http_timeout_secs: 30,
        }
    }
}

impl SyncConfig {
    /// Create a config for testing (small interval, tiny delays).
    pub fn for_testing() -> Self {
        Self {
            batch_size: 3,
            max_attempts: 5,
            retry_delay_ms: 1,
            stagger_ms: 0,
            block_sync_interval: 100,
            indexer_page_size: 10,
            http_timeout_secs: 5,
        }
    }

    /// Retry policy for one sub-range.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Launch delay for the request at `position` inside a batch.
    pub fn stagger_for(&self, position: usize) -> Duration {
        Duration::from_millis(self.stagger_ms.saturating_mul(position as u64))
    }
}

/// One ERC-20 or native token with its pool instances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    /// Display symbol (`ETH`, `DAI`, ...).
    pub symbol: String,
    /// Token decimals.
    pub decimals: u8,
    /// Pool contract per denomination.
    pub instance_address: BTreeMap<String, String>,
}

/// Contracts and endpoints of one network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// GraphQL indexer endpoint, if any.
    #[serde(default)]
    pub indexer_url: Option<String>,
    /// Block the pool contracts were deployed at.
    pub deployed_block: BlockNumber,
    /// Lower-case native currency symbol.
    pub native_currency: String,
    /// Deployment block of the note echoer contract.
    #[serde(default)]
    pub encrypted_notes_block: Option<BlockNumber>,
    /// Note echoer contract.
    #[serde(default)]
    pub echoer_address: Option<String>,
    /// Whether bundled snapshots ship for this network.
    #[serde(default)]
    pub snapshot_enabled: bool,
    /// Tokens keyed by lower-case currency.
    #[serde(default)]
    pub tokens: BTreeMap<String, TokenConfig>,
}

/// Contract address and starting block for one event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractBinding {
    /// Emitting contract
    pub address: String,
    /// First block to scan
    pub deployed_block: BlockNumber,
}

impl NetworkConfig {
    /// Pool contract for `currency` / `denomination`.
    pub fn instance_address(&self, currency: &str, denomination: &str) -> Option<&str> {
        self.tokens
            .get(&currency.to_lowercase())
            .and_then(|token| token.instance_address.get(denomination))
            .map(String::as_str)
    }

    /// Whether the instance may fall back to the bundled snapshot: native
    /// currency on a network that ships snapshots.
    pub fn has_cache(&self, currency: &str) -> bool {
        self.snapshot_enabled && self.native_currency.eq_ignore_ascii_case(currency)
    }

    /// Contract emitting `kind` events for `key`.
    pub fn binding(&self, key: &InstanceKey, kind: EventKind) -> Option<ContractBinding> {
        match kind {
            EventKind::EncryptedNote => Some(ContractBinding {
                address: self.echoer_address.clone()?,
                deployed_block: self.encrypted_notes_block.unwrap_or(self.deployed_block),
            }),
            _ => Some(ContractBinding {
                address: self
                    .instance_address(&key.currency, &key.denomination)?
                    .to_string(),
                deployed_block: self.deployed_block,
            }),
        }
    }
}

/// All configured networks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworksConfig {
    /// Networks keyed by chain id.
    pub networks: BTreeMap<NetworkId, NetworkConfig>,
}

impl NetworksConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EventSyncError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EventSyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
            .map_err(|e| EventSyncError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, EventSyncError> {
        serde_json::from_str(raw).map_err(|e| EventSyncError::Config(e.to_string()))
    }

    /// Explicit path, else `PS_NETWORKS_CONFIG`.
    pub fn resolve_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| std::env::var_os(NETWORKS_CONFIG_ENV).map(PathBuf::from))
    }

    /// Configuration of one network.
    pub fn network(&self, network_id: NetworkId) -> Result<&NetworkConfig, EventSyncError> {
        self.networks
            .get(&network_id)
            .ok_or(EventSyncError::UnknownNetwork(network_id))
    }

    /// Every pool instance on a network, in currency then denomination order.
    pub fn instances(&self, network_id: NetworkId) -> Result<Vec<InstanceKey>, EventSyncError> {
        let network = self.network(network_id)?;
        Ok(network
            .tokens
            .iter()
            .flat_map(|(currency, token)| {
                token
                    .instance_address
                    .keys()
                    .map(move |denomination| InstanceKey::new(network_id, currency, denomination))
            })
            .collect())
    }

    /// Contract emitting `kind` events for `key`.
    pub fn binding(
        &self,
        key: &InstanceKey,
        kind: EventKind,
    ) -> Result<ContractBinding, EventSyncError> {
        self.network(key.network_id)?
            .binding(key, kind)
            .ok_or_else(|| EventSyncError::UnknownInstance(format!("{key} ({kind})")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "networks": {
        "1": {
          "name": "Ethereum Mainnet",
          "rpcUrl": "http://localhost:8545",
          "indexerUrl": "http://localhost:8000/subgraphs/name/pool",
          "deployedBlock": 9116966,
          "nativeCurrency": "eth",
          "encryptedNotesBlock": 11842486,
          "echoerAddress": "0x9B27DD5Bb15d42DC224FCD0B7caEbBe16161Df42",
          "snapshotEnabled": true,
          "tokens": {
            "eth": {
              "symbol": "ETH",
              "decimals": 18,
              "instanceAddress": { "0.1": "0x12D66f87A04A9E220743712cE6d9bB1B5616B8Fc", "1": "0x47CE0C6eD5B0Ce3d3A51fdb1C52DC66a7c3c2936" }
            },
            "dai": {
              "symbol": "DAI",
              "decimals": 18,
              "instanceAddress": { "100": "0xD4B88Df4D29F5CedD6857912842cff3b20C8Cfa3" }
            }
          }
        }
      }
    }"#;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_delay_ms, 1_000);
        assert_eq!(config.stagger_ms, 20);
        assert_eq!(config.block_sync_interval, 10_000);
    }

    #[test]
    fn test_stagger() {
        let config = SyncConfig::default();
        assert_eq!(config.stagger_for(3), Duration::from_millis(60));
    }

    #[test]
    fn test_parse_networks() {
        let networks = NetworksConfig::from_json(SAMPLE).unwrap();
        let mainnet = networks.network(1).unwrap();
        assert_eq!(mainnet.deployed_block, 9_116_966);
        assert!(mainnet.has_cache("ETH"));
        assert!(!mainnet.has_cache("dai"));
        assert!(networks.network(5).is_err());
    }

    #[test]
    fn test_instances_enumerated() {
        let networks = NetworksConfig::from_json(SAMPLE).unwrap();
        let names: Vec<String> = networks
            .instances(1)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["1_dai_100", "1_eth_0.1", "1_eth_1"]);
    }

    #[test]
    fn test_bindings() {
        let networks = NetworksConfig::from_json(SAMPLE).unwrap();
        let key = InstanceKey::new(1, "eth", "0.1");
        let deposits = networks.binding(&key, EventKind::Deposit).unwrap();
        assert_eq!(deposits.deployed_block, 9_116_966);
        let notes = networks.binding(&key, EventKind::EncryptedNote).unwrap();
        assert_eq!(notes.deployed_block, 11_842_486);
        let missing = InstanceKey::new(1, "eth", "1000");
        assert!(networks.binding(&missing, EventKind::Deposit).is_err());
    }
}
