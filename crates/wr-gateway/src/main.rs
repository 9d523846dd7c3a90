//! wa-relay gateway daemon
//!
//! Hosts the tenant session registry and serves the IPC interface the
//! `wa-relay` CLI talks to.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wr_core::config;
use wr_gateway::GatewayState;

#[derive(Parser)]
#[command(name = "wr-gateway")]
#[command(about = "wa-relay gateway daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// IPC port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep tenant state in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("wa-relay gateway starting...");

    let mut config = config::load_gateway_config(args.config.as_deref())
        .context("Failed to load gateway configuration")?;
    if let Some(port) = args.port {
        config.ipc_port = port;
    }

    let state = if args.ephemeral {
        tracing::warn!("Ephemeral mode: tenant state will not survive a restart");
        GatewayState::ephemeral(config)
            .await
            .context("Failed to prepare gateway state")?
    } else {
        GatewayState::open(config)
            .await
            .context("Failed to open tenant state")?
    };

    let cancel = CancellationToken::new();
    wr_gateway::cancel_on_signal(cancel.clone());

    wr_gateway::serve(Arc::new(state), cancel).await
}
