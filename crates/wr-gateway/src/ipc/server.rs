//! IPC server implementation
//!
//! Listens on localhost TCP for JSON-line requests from the CLI. Clients
//! may subscribe to phones; notifications for those phones are pushed as
//! `notification` events between responses.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use wr_core::ipc::{GatewayStatus, IpcEvent, IpcRequest, IpcResponse};
use wr_core::Phone;

use crate::state::GatewayState;

/// IPC server for CLI communication
///
/// Listens on localhost (127.0.0.1) only - not accessible from network.
pub struct IpcServer {
    /// Address to bind (127.0.0.1:port)
    pub address: String,
    state: Arc<GatewayState>,
    start_time: Instant,
    shutdown_token: Option<CancellationToken>,
}

impl IpcServer {
    /// Create a new IPC server
    pub fn new(address: String, state: Arc<GatewayState>) -> Self {
        Self {
            address,
            state,
            start_time: Instant::now(),
            shutdown_token: None,
        }
    }

    /// Set the shutdown token (call before run).
    ///
    /// `run` returns once it is cancelled, and the `shutdown` request
    /// cancels it.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = Some(token);
        self
    }

    /// Accept clients until the shutdown token fires
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.address)
            .await
            .with_context(|| format!("Failed to bind IPC server to {}", self.address))?;

        tracing::info!("IPC server listening on {}", self.address);

        let shutdown = self.shutdown_token.clone().unwrap_or_default();

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("IPC server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr)) => {
                    if !peer_addr.ip().is_loopback() {
                        tracing::warn!("Rejected non-localhost connection from {}", peer_addr);
                        continue;
                    }

                    let state = Arc::clone(&self.state);
                    let start_time = self.start_time;
                    let shutdown_token = self.shutdown_token.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, state, start_time, shutdown_token).await
                        {
                            tracing::warn!("IPC client error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept IPC connection: {}", e);
                }
            }
        }
    }
}

/// Phones a single client wants notifications for
#[derive(Default)]
struct ClientState {
    subscribed: HashSet<Phone>,
}

async fn handle_client(
    stream: TcpStream,
    state: Arc<GatewayState>,
    start_time: Instant,
    shutdown_token: Option<CancellationToken>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    // `next_line` keeps partial input buffered when a notification wins the select
    let mut lines = BufReader::new(reader).lines();
    let mut client = ClientState::default();
    let mut notifications = state.hub.subscribe();

    loop {
        tokio::select! {
            result = lines.next_line() => {
                let Some(line) = result? else {
                    break;
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let response = match serde_json::from_str::<IpcRequest>(trimmed) {
                    Ok(request) => handle_request(
                        request,
                        &state,
                        start_time,
                        &mut client,
                        shutdown_token.as_ref(),
                    ).await,
                    Err(e) => IpcResponse::Error {
                        message: format!("Invalid request: {}", e),
                    },
                };

                let mut response_json = serde_json::to_string(&response)?;
                response_json.push('\n');
                writer.write_all(response_json.as_bytes()).await?;
            }

            result = notifications.recv() => {
                match result {
                    Ok((phone, payload)) => {
                        if client.subscribed.contains(&phone) {
                            let event = IpcEvent::Notification {
                                phone: phone.to_string(),
                                payload,
                            };
                            let mut event_json = serde_json::to_string(&event)?;
                            event_json.push('\n');
                            writer.write_all(event_json.as_bytes()).await?;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("IPC client lagged by {} notifications", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

fn parse_phone(raw: &str) -> Result<Phone, IpcResponse> {
    let phone = Phone::new(raw);
    if phone.is_valid() {
        Ok(phone)
    } else {
        Err(IpcResponse::Error {
            message: format!("Invalid phone number: {:?}", raw),
        })
    }
}

async fn handle_request(
    request: IpcRequest,
    state: &GatewayState,
    start_time: Instant,
    client: &mut ClientState,
    shutdown_token: Option<&CancellationToken>,
) -> IpcResponse {
    let registry = &state.registry;

    match request {
        IpcRequest::Activate { phone } => {
            let phone = match parse_phone(&phone) {
                Ok(phone) => phone,
                Err(response) => return response,
            };
            match registry.activate(&phone).await {
                Ok(view) => IpcResponse::Session(view),
                Err(e) => IpcResponse::Error {
                    message: e.to_string(),
                },
            }
        }

        IpcRequest::Deactivate { phone } => match parse_phone(&phone) {
            Ok(phone) => IpcResponse::Deactivated {
                existed: registry.deactivate(&phone).await,
            },
            Err(response) => response,
        },

        IpcRequest::CheckActivation { phone } => match parse_phone(&phone) {
            Ok(phone) => IpcResponse::Activation {
                active: registry.check_activation(&phone).await,
            },
            Err(response) => response,
        },

        IpcRequest::CheckAuthentication { phone } => {
            let phone = match parse_phone(&phone) {
                Ok(phone) => phone,
                Err(response) => return response,
            };
            match registry.check_authentication(&phone).await {
                Ok(authenticated) => IpcResponse::Authentication { authenticated },
                Err(e) => IpcResponse::Error {
                    message: e.to_string(),
                },
            }
        }

        IpcRequest::ListSessions => IpcResponse::Sessions {
            sessions: registry.list().await,
        },

        IpcRequest::Forget { phone } => {
            let phone = match parse_phone(&phone) {
                Ok(phone) => phone,
                Err(response) => return response,
            };
            match registry.forget(&phone).await {
                Ok(existed) => IpcResponse::Forgotten { existed },
                Err(e) => IpcResponse::Error {
                    message: e.to_string(),
                },
            }
        }

        IpcRequest::Subscribe { phone } => match parse_phone(&phone) {
            Ok(phone) => {
                tracing::debug!(phone = %phone, "Client subscribed");
                client.subscribed.insert(phone);
                IpcResponse::Ok
            }
            Err(response) => response,
        },

        IpcRequest::Unsubscribe { phone } => {
            client.subscribed.remove(&Phone::new(phone));
            IpcResponse::Ok
        }

        IpcRequest::GetStatus => {
            let sessions = registry.list().await;
            IpcResponse::Status(GatewayStatus {
                uptime_secs: start_time.elapsed().as_secs(),
                session_count: sessions.len(),
                active_count: sessions.iter().filter(|s| s.active).count(),
                authenticated_count: sessions.iter().filter(|s| s.authenticated).count(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
        }

        IpcRequest::Ping => IpcResponse::Pong,

        IpcRequest::Shutdown => {
            tracing::info!("Shutdown requested via IPC");
            if let Some(token) = shutdown_token {
                token.cancel();
                IpcResponse::Ok
            } else {
                IpcResponse::Error {
                    message: "Shutdown not supported (no shutdown token configured)".to_string(),
                }
            }
        }
    }
}
