//! Connections to the messaging network

mod local;

pub use local::{LocalConnection, LocalConnector};
