//! Connection traits

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::error::ConnectionError;
use crate::types::{PairingEvent, Phone};

/// Lazily produced, possibly endless sequence of pairing events
pub type PairingEvents = BoxStream<'static, PairingEvent>;

/// One tenant's connection to the external messaging network
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    /// Tenant this connection belongs to
    fn phone(&self) -> &Phone;

    /// Whether a credential from an earlier pairing is present
    fn has_credential(&self) -> bool;

    /// Open the pairing event sequence.
    ///
    /// Must be called before `connect` so no event is missed.
    async fn pairing_events(&self) -> Result<PairingEvents, ConnectionError>;

    /// Connect to the network
    async fn connect(&self) -> Result<(), ConnectionError>;

    /// Disconnect from the network. Idempotent.
    async fn disconnect(&self);

    /// Release connection-local resources (the local credential store)
    async fn release(&self) -> Result<(), ConnectionError>;
}

/// Creates connections for tenants
#[async_trait]
pub trait Connector: Send + Sync {
    /// Construct a connection for the given phone.
    ///
    /// Construction only opens local state; no network traffic happens
    /// until `ConnectionHandle::connect`.
    fn open(&self, phone: &Phone) -> Result<Arc<dyn ConnectionHandle>, ConnectionError>;

    /// Erase the tenant's local credential so the next activation pairs again
    async fn forget(&self, phone: &Phone) -> Result<(), ConnectionError>;
}
