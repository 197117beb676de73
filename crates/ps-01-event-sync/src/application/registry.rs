//! # Event Service Registry
//!
//! One `EventService` per instance key, created on first use and kept for
//! the process lifetime. Services on the same network share one provider
//! and one indexer client.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{InstanceKey, NetworkId};
use tracing::info;

use super::service::{EventService, EventSources};
use crate::config::{NetworksConfig, SyncConfig};
use crate::domain::EventSyncError;
use crate::ports::{EventIndexer, EventStore, LogProvider, LogProviderFactory, SnapshotSource};

#[derive(Clone)]
struct NetworkConnection {
    provider: Arc<dyn LogProvider>,
    indexer: Option<Arc<dyn EventIndexer>>,
}

/// Keyed cache of event services.
pub struct EventServiceRegistry {
    networks: NetworksConfig,
    config: SyncConfig,
    factory: Arc<dyn LogProviderFactory>,
    store: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotSource>,
    services: Mutex<HashMap<InstanceKey, Arc<EventService>>>,
    connections: Mutex<HashMap<NetworkId, NetworkConnection>>,
}

impl EventServiceRegistry {
    pub fn new(
        networks: NetworksConfig,
        config: SyncConfig,
        factory: Arc<dyn LogProviderFactory>,
        store: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotSource>,
    ) -> Self {
        Self {
            networks,
            config,
            factory,
            store,
            snapshots,
            services: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Networks served.
    pub fn networks(&self) -> &NetworksConfig {
        &self.networks
    }

    /// Existing service for `key`, or a new one bound to the network's
    /// shared connection.
    pub fn get_service(&self, key: &InstanceKey) -> Result<Arc<EventService>, EventSyncError> {
        if let Some(service) = self.services.lock().get(key) {
            return Ok(service.clone());
        }

        let network = self.networks.network(key.network_id)?;
        if network
            .instance_address(&key.currency, &key.denomination)
            .is_none()
        {
            return Err(EventSyncError::UnknownInstance(key.to_string()));
        }
        let connection = self.connection(key.network_id)?;

        let service = Arc::new(EventService::new(
            key.clone(),
            network.clone(),
            self.config.clone(),
            EventSources {
                store: self.store.clone(),
                snapshots: self.snapshots.clone(),
                provider: connection.provider,
                indexer: connection.indexer,
            },
        ));

        // A concurrent caller may have won the race; keep the first.
        let mut services = self.services.lock();
        let entry = services.entry(key.clone()).or_insert_with(|| {
            info!(instance = %key, "Created event service");
            service
        });
        Ok(entry.clone())
    }

    /// Number of services created so far.
    pub fn len(&self) -> usize {
        self.services.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn connection(&self, network_id: NetworkId) -> Result<NetworkConnection, EventSyncError> {
        let mut connections = self.connections.lock();
        if let Some(connection) = connections.get(&network_id) {
            return Ok(connection.clone());
        }
        let network = self.networks.network(network_id)?;
        let connection = NetworkConnection {
            provider: self.factory.provider_for(network_id, network)?,
            indexer: self.factory.indexer_for(network_id, network),
        };
        connections.insert(network_id, connection.clone());
        Ok(connection)
    }
}
