//! Node RPC log provider over an `ethers` HTTP provider.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::types::{Address, Filter};
use shared_types::{BlockNumber, Event, NetworkId};
use tracing::debug;

use super::abi::{decode_logs, event_topic};
use super::graph_indexer::GraphIndexer;
use crate::config::{NetworkConfig, SyncConfig};
use crate::domain::{EventSyncError, LogFilter};
use crate::ports::{EventIndexer, LogProvider, LogProviderFactory};

/// HTTP provider shared by every reader of one network.
pub type HttpProvider = Provider<Http>;

/// Connect an HTTP provider to `rpc_url`.
pub fn connect_http(rpc_url: &str) -> Result<Arc<HttpProvider>, EventSyncError> {
    HttpProvider::try_from(rpc_url)
        .map(Arc::new)
        .map_err(|e| EventSyncError::Config(format!("invalid rpcUrl {rpc_url}: {e}")))
}

/// `LogProvider` over a shared HTTP provider. Node errors keep their
/// message so range clamps can be read back from them.
pub struct JsonRpcLogProvider {
    provider: Arc<HttpProvider>,
    timeout: Duration,
}

impl JsonRpcLogProvider {
    pub fn new(provider: Arc<HttpProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    async fn timed<T, F>(&self, method: &str, call: F) -> Result<T, EventSyncError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| EventSyncError::Provider(format!("{method}: {e}"))),
            Err(_) => Err(EventSyncError::Provider(format!(
                "{method}: timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl LogProvider for JsonRpcLogProvider {
    async fn block_number(&self) -> Result<BlockNumber, EventSyncError> {
        let head = self
            .timed("eth_blockNumber", self.provider.get_block_number())
            .await?;
        Ok(head.as_u64())
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Event>, EventSyncError> {
        let address: Address = filter
            .address
            .parse()
            .map_err(|_| EventSyncError::Config(format!("invalid address {}", filter.address)))?;
        let query = Filter::new()
            .address(address)
            .topic0(event_topic(filter.kind))
            .from_block(filter.range.from)
            .to_block(filter.range.to);

        let logs = self
            .timed("eth_getLogs", self.provider.get_logs(&query))
            .await?;
        debug!(
            kind = %filter.kind,
            range = %filter.range,
            count = logs.len(),
            "Fetched logs"
        );
        decode_logs(filter.kind, logs)
    }
}

/// Builds HTTP log providers and GraphQL indexers from network config.
pub struct HttpSourceFactory {
    config: SyncConfig,
}

impl HttpSourceFactory {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.http_timeout_secs)
    }
}

impl LogProviderFactory for HttpSourceFactory {
    fn provider_for(
        &self,
        network_id: NetworkId,
        network: &NetworkConfig,
    ) -> Result<Arc<dyn LogProvider>, EventSyncError> {
        if network.rpc_url.is_empty() {
            return Err(EventSyncError::Config(format!(
                "network {network_id} has no rpcUrl"
            )));
        }
        let provider = connect_http(&network.rpc_url)?;
        Ok(Arc::new(JsonRpcLogProvider::new(provider, self.timeout())))
    }

    fn indexer_for(
        &self,
        _network_id: NetworkId,
        network: &NetworkConfig,
    ) -> Option<Arc<dyn EventIndexer>> {
        let url = network.indexer_url.as_ref()?;
        Some(Arc::new(GraphIndexer::new(
            url.clone(),
            self.config.indexer_page_size,
            self.timeout(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(rpc_url: &str) -> NetworkConfig {
        NetworkConfig {
            name: String::new(),
            rpc_url: rpc_url.to_string(),
            indexer_url: None,
            deployed_block: 0,
            native_currency: "eth".to_string(),
            encrypted_notes_block: None,
            echoer_address: None,
            snapshot_enabled: false,
            tokens: Default::default(),
        }
    }

    #[test]
    fn test_factory_requires_rpc_url() {
        let factory = HttpSourceFactory::new(SyncConfig::default());
        assert!(factory.provider_for(1, &network("")).is_err());
        assert!(factory.indexer_for(1, &network("")).is_none());
    }

    #[test]
    fn test_factory_rejects_malformed_url() {
        let factory = HttpSourceFactory::new(SyncConfig::default());
        let err = factory.provider_for(1, &network("not a url")).err().unwrap();
        assert!(matches!(err, EventSyncError::Config(_)));
        assert!(factory.provider_for(1, &network("http://127.0.0.1:8545")).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_address_is_config_error() {
        let provider = connect_http("http://127.0.0.1:8545").unwrap();
        let logs = JsonRpcLogProvider::new(provider, Duration::from_secs(1));
        let filter = LogFilter::new(
            "0xnot-an-address",
            shared_types::EventKind::Deposit,
            crate::domain::BlockRange::new(1, 2),
        );
        assert!(matches!(
            logs.get_logs(&filter).await,
            Err(EventSyncError::Config(_))
        ));
    }
}
