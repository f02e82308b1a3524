//! Error types for the SMS gateway client.

use thiserror::Error;
use verification_core::ServiceError;

/// Gateway client error types.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected credentials ({0})")]
    Unauthorized(u16),

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Gateway error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for ServiceError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unauthorized(_) => ServiceError::SessionExpired,
            GatewayError::InvalidCode => ServiceError::Rejected(e.to_string()),
            other => ServiceError::Network(other.to_string()),
        }
    }
}
