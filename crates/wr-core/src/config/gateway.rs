//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Default IPC port for CLI to gateway communication
pub const DEFAULT_IPC_PORT: u16 = 22340;

/// Configuration for the gateway daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// IPC port (bound on localhost only)
    pub ipc_port: u16,

    /// Directory holding each tenant's linked-device credential
    pub session_dir: PathBuf,

    /// Directory pairing-code images are written to
    pub artifact_dir: PathBuf,

    /// File holding the persisted authenticated flags
    pub state_file: PathBuf,

    /// Pairing handshake timing
    pub pairing: PairingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ipc_port: DEFAULT_IPC_PORT,
            session_dir: PathBuf::from("session"),
            artifact_dir: PathBuf::from("public"),
            state_file: super::default_config_dir().join("tenants.json"),
            pairing: PairingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Get the IPC address (localhost:port)
    pub fn ipc_address(&self) -> String {
        format!("127.0.0.1:{}", self.ipc_port)
    }

    /// Reject configurations the gateway cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ipc_port == 0 {
            return Err(ConfigError::Invalid("ipc_port must be non-zero".into()));
        }
        self.pairing.validate()
    }
}

/// Pairing code rotation schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// How long the first code stays valid
    #[serde(with = "duration_secs")]
    pub first_code_timeout: Duration,

    /// How long each rotated code stays valid
    #[serde(with = "duration_secs")]
    pub code_rotation: Duration,

    /// Codes emitted before the handshake times out
    pub max_codes: u32,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            first_code_timeout: Duration::from_secs(60),
            code_rotation: Duration::from_secs(20),
            max_codes: 6,
        }
    }
}

impl PairingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_codes == 0 {
            return Err(ConfigError::Invalid("pairing.max_codes must be at least 1".into()));
        }
        if self.first_code_timeout.is_zero() || self.code_rotation.is_zero() {
            return Err(ConfigError::Invalid("pairing durations must be non-zero".into()));
        }
        Ok(())
    }

    /// Upper bound on how long a handshake can stay pending
    pub fn total_window(&self) -> Duration {
        self.first_code_timeout + self.code_rotation * self.max_codes.saturating_sub(1)
    }
}
