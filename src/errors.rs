use std::result::Result as StdResult;

use anselus_config::ConfigError as ClientConfigError;
use thiserror::Error;

/// Unified error type for the protocol, crypto, keycard and storage layers.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Bad parameter value: {0}")]
    BadParameterValue(String),
    #[error("Bad data: {0}")]
    BadData(String),
    #[error("Resource exists: {0}")]
    ResourceExists(String),
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Passphrase too weak ({strength})")]
    WeakPassphrase { strength: String },
    #[error("Unsupported keycard type: {0}")]
    UnsupportedKeycardType(String),
    #[error("Unsupported hash type: {0}")]
    UnsupportedHashType(String),
    #[error("Unsupported encryption type: {0}")]
    UnsupportedEncryptionType(String),
    #[error("Invalid keycard: {0}")]
    InvalidKeycard(String),
    #[error("Required field missing: {0}")]
    RequiredFieldMissing(String),
    #[error("Signature missing: {0}")]
    SignatureMissing(String),
    #[error("Keycard entry not compliant: {0}")]
    NotCompliant(String),
    #[error("Feature not available: {0}")]
    FeatureNotAvailable(String),
    #[error("Cryptography error: {0}")]
    Crypto(String),
    #[error("Persistence error: {0}")]
    StorageError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = StdResult<T, ClientError>;

/// User-facing CLI error wrapper.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] ClientError),
    #[error("Invalid input: {0}")]
    Input(String),
    #[error("Command failed: {0}")]
    Command(String),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::StorageError(err.to_string())
    }
}

impl From<ClientConfigError> for ClientError {
    fn from(err: ClientConfigError) -> Self {
        match err {
            ClientConfigError::Io(io) => ClientError::StorageError(io.to_string()),
            other => ClientError::ConfigError(other.to_string()),
        }
    }
}

impl From<ClientConfigError> for CliError {
    fn from(err: ClientConfigError) -> Self {
        CliError::from(ClientError::from(err))
    }
}
