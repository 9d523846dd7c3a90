//! Persistent tenant state

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::types::Phone;

/// Durable per-tenant record of whether pairing has completed.
///
/// Implementations must tolerate concurrent calls for distinct phones.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the persisted flag; a phone with no record reads as `false`
    async fn read_authenticated(&self, phone: &Phone) -> Result<bool, PersistenceError>;

    /// Upsert the persisted flag
    async fn write_authenticated(
        &self,
        phone: &Phone,
        authenticated: bool,
    ) -> Result<(), PersistenceError>;

    /// Delete the tenant's record, returning whether one existed
    async fn remove(&self, phone: &Phone) -> Result<bool, PersistenceError>;
}
