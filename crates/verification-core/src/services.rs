//! External collaborators the sequencer delegates to.

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a verification code is being sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationPurpose {
    /// New member registration
    #[default]
    SignUp,
    /// Forgotten password reset
    PasswordReset,
}

impl VerificationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationPurpose::SignUp => "sign-up",
            VerificationPurpose::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for VerificationPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends verification codes by SMS.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Ask the backend to text a fresh code to `phone_number`.
    async fn send(
        &self,
        phone_number: &str,
        purpose: VerificationPurpose,
    ) -> Result<(), ServiceError>;
}

/// Checks codes the user typed in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Confirm that `code` is the one last sent to `phone_number`.
    async fn verify(
        &self,
        phone_number: &str,
        code: &str,
        purpose: VerificationPurpose,
    ) -> Result<(), ServiceError>;
}
