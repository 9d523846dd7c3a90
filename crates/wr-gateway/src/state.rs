//! Gateway state

use std::sync::Arc;

use wr_core::config::GatewayConfig;
use wr_core::error::BridgeError;
use wr_core::traits::StateStore;

use crate::notify::NotificationHub;
use crate::pairing::QrFileRenderer;
use crate::registry::SessionRegistry;
use crate::store::{JsonStateStore, MemoryStateStore};
use crate::transport::LocalConnector;

/// Shared state of the gateway daemon
pub struct GatewayState {
    /// Configuration
    pub config: GatewayConfig,
    /// Tenant session registry
    pub registry: Arc<SessionRegistry>,
    /// Notification fan-out (also the registry's sink)
    pub hub: Arc<NotificationHub>,
}

impl GatewayState {
    /// Build the production wiring: JSON state file, local device transport,
    /// QR file renderer
    pub async fn open(config: GatewayConfig) -> Result<Self, BridgeError> {
        let store = JsonStateStore::open(&config.state_file).await?;
        tracing::info!("Tenant state file: {:?}", store.path());
        Self::with_store(config, Arc::new(store)).await
    }

    /// Same wiring, but nothing is persisted across restarts
    pub async fn ephemeral(config: GatewayConfig) -> Result<Self, BridgeError> {
        Self::with_store(config, Arc::new(MemoryStateStore::new())).await
    }

    async fn with_store(
        config: GatewayConfig,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, BridgeError> {
        tracing::debug!(
            "Pairing: {} codes, handshake window {:?}",
            config.pairing.max_codes,
            config.pairing.total_window()
        );
        let connector = LocalConnector::new(&config.session_dir, config.pairing.clone());
        connector.prepare().await?;

        let hub = Arc::new(NotificationHub::new());
        let registry = SessionRegistry::new(
            Arc::new(connector),
            hub.clone(),
            store,
            Arc::new(QrFileRenderer::new(&config.artifact_dir)),
        );

        Ok(Self {
            config,
            registry: Arc::new(registry),
            hub,
        })
    }

    /// Assemble state from prebuilt parts
    pub fn with_parts(
        config: GatewayConfig,
        registry: Arc<SessionRegistry>,
        hub: Arc<NotificationHub>,
    ) -> Self {
        Self {
            config,
            registry,
            hub,
        }
    }
}
