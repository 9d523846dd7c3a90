//! wa-relay CLI
//!
//! Single binary for all wa-relay operations:
//! - Gateway daemon (`serve`)
//! - Tenant management (activate, deactivate, forget, watch)
//! - Inspection (status, list)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wa_relay::commands;
use wa_relay::ipc::{GatewayClient, DEFAULT_IPC_PORT};
use wa_relay::output::{print_error, print_info, print_success, print_warning};
use wr_core::config;
use wr_gateway::GatewayState;

#[derive(Parser)]
#[command(name = "wa-relay")]
#[command(author, version, about = "Multi-tenant messaging session gateway")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Gateway IPC port (overrides config)
    #[arg(short, long, global = true, env = "WA_RELAY_PORT")]
    port: Option<u16>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway daemon
    /// Alias: start
    #[command(alias = "start")]
    Serve {
        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,
        /// Keep tenant state in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Stop the gateway daemon
    Stop,

    /// Activate a tenant, pairing its device if needed
    Activate {
        /// Tenant phone number
        phone: String,
        /// Follow the pairing handshake until it finishes
        #[arg(short, long)]
        watch: bool,
    },

    /// Deactivate a tenant and close its connection
    Deactivate {
        /// Tenant phone number
        phone: String,
    },

    /// Show gateway status, or one tenant's flags
    Status {
        /// Tenant phone number
        phone: Option<String>,
    },

    /// List tenant sessions
    List,

    /// Print pairing notifications for a tenant
    Watch {
        /// Tenant phone number
        phone: String,
    },

    /// Deactivate a tenant and erase its stored state and device credential
    Forget {
        /// Tenant phone number
        phone: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let log_level = match &cli.command {
        Commands::Serve {
            foreground: true, ..
        } if cli.verbose == 0 && !cli.quiet => "info",
        _ => log_level,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let port = match cli.port {
        Some(port) => port,
        None => client_port(cli.config.as_deref()),
    };
    let mut client = GatewayClient::with_port(port);

    match cli.command {
        Commands::Serve {
            foreground,
            ephemeral,
        } => {
            if !foreground && client.ping().await.unwrap_or(false) {
                print_warning(&format!("Gateway is already running on port {}", port));
                return Ok(());
            }
            run_gateway(foreground, ephemeral, cli.port, cli.config.as_deref()).await?;
        }

        Commands::Stop => {
            print_info("Stopping gateway...");
            match client.shutdown().await {
                Ok(()) => {
                    print_success("Gateway stopped");
                }
                Err(e) => {
                    if e.to_string().contains("Is the gateway running") {
                        print_warning("Gateway is not running");
                    } else {
                        print_error(&format!("Failed to stop gateway: {}", e));
                        return Err(e);
                    }
                }
            }
        }

        Commands::Activate { phone, watch } => {
            commands::activate_command(&mut client, &phone, watch).await?;
        }

        Commands::Deactivate { phone } => {
            commands::deactivate_command(&mut client, &phone).await?;
        }

        Commands::Status { phone } => {
            commands::status_command(&mut client, phone.as_deref()).await?;
        }

        Commands::List => {
            commands::list_command(&mut client).await?;
        }

        Commands::Watch { phone } => {
            commands::watch_command(&mut client, &phone).await?;
        }

        Commands::Forget { phone } => {
            commands::forget_command(&mut client, &phone).await?;
        }
    }

    Ok(())
}

/// Port the gateway listens on according to the config file
fn client_port(config_path: Option<&Path>) -> u16 {
    match config::load_gateway_config(config_path) {
        Ok(config) => config.ipc_port,
        Err(e) => {
            tracing::debug!("Falling back to default IPC port: {}", e);
            DEFAULT_IPC_PORT
        }
    }
}

// ============================================================================
// Gateway Implementation
// ============================================================================

async fn run_gateway(
    foreground: bool,
    ephemeral: bool,
    port_override: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    if !foreground {
        // Daemonize by re-spawning ourselves
        let exe = std::env::current_exe()?;
        let mut cmd = std::process::Command::new(exe);
        cmd.arg("serve").arg("--foreground");
        if ephemeral {
            cmd.arg("--ephemeral");
        }
        if let Some(port) = port_override {
            cmd.arg("--port").arg(port.to_string());
        }
        if let Some(path) = config_path {
            cmd.arg("--config").arg(path);
        }

        let child = cmd
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("Failed to spawn gateway process")?;

        print_success(&format!("Gateway started (PID: {})", child.id()));
        return Ok(());
    }

    tracing::info!("wa-relay gateway starting...");

    if config_path.is_none() && !ephemeral {
        match config::init_default_config() {
            Ok(Some(path)) => print_info(&format!("First run - wrote default config to {:?}", path)),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to write default config: {}", e),
        }
    }

    let mut config = config::load_gateway_config(config_path)
        .context("Failed to load gateway configuration")?;
    if let Some(port) = port_override {
        config.ipc_port = port;
    }

    let state = if ephemeral {
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
