//! wr-gateway: multi-tenant messaging session gateway
//!
//! The gateway keeps one session per tenant phone number. Activating a
//! tenant either reconnects its stored device credential or walks it
//! through a QR pairing handshake; status changes are pushed to listeners
//! through the notification hub and out over the IPC interface used by
//! the CLI.

pub mod ipc;
pub mod notify;
pub mod pairing;
pub mod registry;
pub mod signal;
pub mod state;
pub mod store;
pub mod transport;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use wr_core::config::GatewayConfig;

pub use ipc::IpcServer;
pub use notify::NotificationHub;
pub use registry::SessionRegistry;
pub use signal::{cancel_on_signal, shutdown_signal};
pub use state::GatewayState;

/// Run the gateway with its on-disk state until `cancel` fires
pub async fn run_gateway(config: GatewayConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let state = GatewayState::open(config)
        .await
        .context("Failed to open tenant state")?;
    serve(Arc::new(state), cancel).await
}

/// Serve IPC for prepared state until `cancel` fires, then drain sessions
pub async fn serve(state: Arc<GatewayState>, cancel: CancellationToken) -> anyhow::Result<()> {
    let server = IpcServer::new(state.config.ipc_address(), Arc::clone(&state))
        .with_shutdown_token(cancel.clone());

    let result = server.run().await;
    // Bind failures return before cancellation; stop anything else watching it
    cancel.cancel();

    state.registry.shutdown().await;
    tracing::info!("Gateway shutdown complete");
    result
}
