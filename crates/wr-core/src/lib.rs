//! wr-core: Core abstractions and configuration for wa-relay
//!
//! This crate provides the shared types, collaborator traits, error
//! taxonomy, configuration and IPC wire types used by the gateway
//! daemon and the operator CLI.

pub mod config;
pub mod error;
pub mod ipc;
pub mod time;
pub mod traits;
pub mod types;

pub use error::BridgeError;
pub use types::{Notification, PairingEvent, Phone, SessionId, SessionView};
