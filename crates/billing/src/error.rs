//! Error types for billing sessions.

use billing_core::{CoreError, ResponseCode, VerificationFailure};
use billing_service::ServiceError;
use thiserror::Error;

/// Underlying cause attached to an error.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors delivered to session listeners.
#[derive(Debug, Error)]
pub enum BillingError {
    /// The session was closed or the backend connection is gone.
    #[error("billing session disposed")]
    Disposed,

    /// The backend replied with something outside its contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The backend answered with a non-OK status.
    #[error("backend returned {code}")]
    BackendStatus {
        code: ResponseCode,
        #[source]
        cause: Option<Cause>,
    },

    /// A signature or developer payload did not check out.
    #[error("verification failed: {0}")]
    VerificationFailed(VerificationFailure),

    /// The purchase flow could not be started or finished.
    #[error("purchase failed: {reason}")]
    Purchase {
        reason: String,
        #[source]
        cause: Option<Cause>,
    },

    /// A backend document could not be parsed.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("base64 decode error: {0}")]
    Decode(String),

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl BillingError {
    /// Backend status without an attached cause.
    pub fn backend_status(code: ResponseCode) -> Self {
        BillingError::BackendStatus { code, cause: None }
    }

    pub fn backend_status_with_cause(code: ResponseCode, cause: impl Into<Cause>) -> Self {
        BillingError::BackendStatus {
            code,
            cause: Some(cause.into()),
        }
    }

    pub fn purchase(reason: impl Into<String>) -> Self {
        BillingError::Purchase {
            reason: reason.into(),
            cause: None,
        }
    }

    pub fn purchase_with_cause(reason: impl Into<String>, cause: impl Into<Cause>) -> Self {
        BillingError::Purchase {
            reason: reason.into(),
            cause: Some(cause.into()),
        }
    }

    /// The status code reported alongside this error.
    ///
    /// Backend codes pass through; client-side failures map to the negative
    /// codes on [`ResponseCode`].
    pub fn code(&self) -> ResponseCode {
        match self {
            BillingError::BackendStatus { code, .. } => *code,
            BillingError::Disposed => ResponseCode::DISPOSED,
            BillingError::VerificationFailed(_) => ResponseCode::VERIFICATION_FAILED,
            BillingError::Purchase { .. } => ResponseCode::PURCHASE_ERROR,
            _ => ResponseCode::UNKNOWN_ERROR,
        }
    }
}

impl From<CoreError> for BillingError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Decode(e) => BillingError::Decode(e.to_string()),
            CoreError::InvalidKey(msg) => BillingError::InvalidKey(msg),
            CoreError::MalformedRecord(msg) => BillingError::MalformedRecord(msg),
            CoreError::VerificationFailed(failure) => BillingError::VerificationFailed(failure),
        }
    }
}

impl From<ServiceError> for BillingError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Disposed => BillingError::Disposed,
            ServiceError::Protocol(msg) => BillingError::Protocol(msg),
            ServiceError::Status(code) => BillingError::backend_status(code),
            ServiceError::Transport(_) => {
                BillingError::backend_status_with_cause(ResponseCode::ERROR, e)
            }
            ServiceError::BindUnavailable | ServiceError::BindRejected(_) => {
                BillingError::backend_status_with_cause(ResponseCode::BILLING_UNAVAILABLE, e)
            }
        }
    }
}

/// Result type for billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;
