//! In-memory state store

use async_trait::async_trait;
use dashmap::DashMap;

use wr_core::error::PersistenceError;
use wr_core::traits::StateStore;
use wr_core::Phone;

/// `StateStore` kept in process memory.
///
/// Used by tests and by `--ephemeral` runs.
#[derive(Default)]
pub struct MemoryStateStore {
    rows: DashMap<Phone, bool>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read_authenticated(&self, phone: &Phone) -> Result<bool, PersistenceError> {
        Ok(self.rows.get(phone).map(|r| *r).unwrap_or(false))
    }

    async fn write_authenticated(
        &self,
        phone: &Phone,
        authenticated: bool,
    ) -> Result<(), PersistenceError> {
        self.rows.insert(phone.clone(), authenticated);
        Ok(())
    }

    async fn remove(&self, phone: &Phone) -> Result<bool, PersistenceError> {
        Ok(self.rows.remove(phone).is_some())
    }
}
