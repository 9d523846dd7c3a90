//! Core error types for wa-relay

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the wa-relay ecosystem
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Persistence error
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Pairing code rendering error
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors talking to the external messaging network.
///
/// Fatal to the Activate call that triggered them; never retried automatically.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The network refused or failed the connect attempt
    #[error("Connection refused: {0}")]
    Refused(String),

    /// An established connection dropped
    #[error("Connection lost: {0}")]
    Lost(String),

    /// The pairing event source could not be opened
    #[error("Pairing unavailable: {0}")]
    PairingUnavailable(String),

    /// The connection's local credential store was already released
    #[error("Connection already released for {0}")]
    Released(String),

    /// Local credential store I/O failed
    #[error("Credential store error: {0}")]
    CredentialStore(#[from] std::io::Error),
}

/// Errors reading or writing the persisted authenticated flag
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Underlying file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored records could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store is not reachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors producing a scannable pairing-code artifact
#[derive(Error, Debug)]
pub enum RenderError {
    /// The code could not be encoded as an image
    #[error("Failed to encode pairing code: {0}")]
    Encode(String),

    /// The artifact could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
