//! Collaborator trait definitions

mod connection;
mod sink;
mod store;

pub use connection::{ConnectionHandle, Connector, PairingEvents};
pub use sink::{CodeRenderer, NotificationSink};
pub use store::StateStore;
