use thiserror::Error;

#[derive(Error, Debug)]
pub enum FmdError {
    /// The server rejected the account id / password pair.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Transport failure or non-success status from the server.
    #[error("Request to {endpoint} failed: {reason}")]
    Operation { endpoint: String, reason: String },

    /// Blob shorter than one RSA slot plus IV. The server had nothing to give us.
    #[error("Blob too small for decryption: {actual} bytes (expected at least {minimum})")]
    BlobTooSmall { actual: usize, minimum: usize },

    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Response body did not have the expected shape.
    #[error("Failed to parse server response for {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Client is not authenticated")]
    NotAuthenticated,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FmdError {
    pub(crate) fn operation(endpoint: &str, reason: impl std::fmt::Display) -> Self {
        Self::Operation {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn protocol(endpoint: &str, reason: impl std::fmt::Display) -> Self {
        Self::Protocol {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller may retry the same call later (with its own backoff).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Operation { .. })
    }

    /// Whether this error means "no data" rather than a real failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::BlobTooSmall { .. })
    }
}

pub type Result<T> = std::result::Result<T, FmdError>;
