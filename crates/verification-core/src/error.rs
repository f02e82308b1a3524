//! Verification error types.

use crate::limiter::DenialReason;
use thiserror::Error;

/// Failure reported by an external messaging or verification collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Persistence failures of a record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the verification sequencer.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Verification code not sent: {0}")]
    RateLimited(DenialReason),

    #[error(transparent)]
    Network(#[from] ServiceError),

    #[error("Verification code expired, request a new one")]
    Expired,

    #[error("No verification code has been requested")]
    CodeNotRequested,

    #[error("Attempt store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for verification operations.
pub type VerificationResult<T> = Result<T, VerificationError>;
