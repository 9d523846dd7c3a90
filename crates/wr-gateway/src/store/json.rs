//! JSON file backed state store
//!
//! Stored as `{"version": 1, "tenants": [{phone, isAuthenticated, updatedAt}]}`,
//! one record per phone. The whole file is rewritten on every change via a
//! temporary file and a rename, so a crash never leaves a half-written file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use wr_core::error::PersistenceError;
use wr_core::traits::StateStore;
use wr_core::Phone;

const STORE_VERSION: u8 = 1;

/// One persisted tenant row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub phone: Phone,
    pub is_authenticated: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u8,
    tenants: Vec<TenantRecord>,
}

/// `StateStore` persisted to a JSON file
pub struct JsonStateStore {
    path: PathBuf,
    rows: Mutex<BTreeMap<Phone, TenantRecord>>,
}

impl JsonStateStore {
    /// Open the store at `path`, loading existing records if the file exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let rows = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file: StoreFile = serde_json::from_slice(&bytes)?;
                if file.version != STORE_VERSION {
                    return Err(PersistenceError::Unavailable(format!(
                        "unsupported store version {} in {}",
                        file.version,
                        path.display()
                    )));
                }
                file.tenants
                    .into_iter()
                    .map(|record| (record.phone.clone(), record))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("Loaded {} tenant records from {:?}", rows.len(), path);

        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of every stored record
    pub async fn records(&self) -> Vec<TenantRecord> {
        self.rows.lock().await.values().cloned().collect()
    }

    async fn flush(&self, rows: &BTreeMap<Phone, TenantRecord>) -> Result<(), PersistenceError> {
        let file = StoreFile {
            version: STORE_VERSION,
            tenants: rows.values().cloned().collect(),
        };
        let content = serde_json::to_vec_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn read_authenticated(&self, phone: &Phone) -> Result<bool, PersistenceError> {
        Ok(self
            .rows
            .lock()
            .await
            .get(phone)
            .map(|r| r.is_authenticated)
            .unwrap_or(false))
    }

    async fn write_authenticated(
        &self,
        phone: &Phone,
        authenticated: bool,
    ) -> Result<(), PersistenceError> {
        let mut rows = self.rows.lock().await;
        let previous = rows.insert(
            phone.clone(),
            TenantRecord {
                phone: phone.clone(),
                is_authenticated: authenticated,
                updated_at: Utc::now(),
            },
        );

        if let Err(e) = self.flush(&rows).await {
            // Keep memory consistent with what is on disk
            match previous {
                Some(record) => rows.insert(phone.clone(), record),
                None => rows.remove(phone),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, phone: &Phone) -> Result<bool, PersistenceError> {
        let mut rows = self.rows.lock().await;
        let Some(previous) = rows.remove(phone) else {
            return Ok(false);
        };

        if let Err(e) = self.flush(&rows).await {
            rows.insert(phone.clone(), previous);
            return Err(e);
        }
        Ok(true)
    }
}
