//! IPC client for communicating with the gateway
//!
//! Uses TCP on localhost. Notification events pushed by the gateway are
//! buffered by the client while it waits for responses.

mod client;

pub use client::GatewayClient;

pub use wr_core::ipc::{default_ipc_address, GatewayStatus, IpcEvent};
pub use wr_core::config::DEFAULT_IPC_PORT;
