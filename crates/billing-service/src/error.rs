//! Error types for the service module.

use thiserror::Error;

use billing_core::ResponseCode;

/// Errors that can occur while talking to the billing backend.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// No live connection to the backend.
    #[error("billing service disposed")]
    Disposed,

    /// The backend replied with something outside its contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The backend answered with a defined non-OK status.
    #[error("backend returned {0}")]
    Status(ResponseCode),

    /// The remote call itself failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The platform could not bind to the billing service.
    #[error("billing service unavailable")]
    BindUnavailable,

    /// The platform refused to bind (security rejection).
    #[error("bind rejected: {0}")]
    BindRejected(String),
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
