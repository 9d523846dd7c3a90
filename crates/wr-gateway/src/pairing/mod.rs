//! Device pairing handshake

mod artifact;
mod authenticator;

pub use artifact::{artifact_file_name, unique_artifact_path, QrFileRenderer};
pub use authenticator::{PairingAuthenticator, PairingOutcome};
