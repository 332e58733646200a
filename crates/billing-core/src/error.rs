//! Error types for the billing core.

use thiserror::Error;

/// Errors raised by codec, parsing and verification primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("base64 decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("verification failed: {0}")]
    VerificationFailed(VerificationFailure),
}

/// Why a signed record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    /// The signature does not match the payload under the configured key.
    Signature,
    /// The developer payload echoed back differs from the one sent.
    PayloadMismatch,
}

impl std::fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationFailure::Signature => write!(f, "signature mismatch"),
            VerificationFailure::PayloadMismatch => write!(f, "developer payload mismatch"),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::MalformedRecord(e.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
