//! SMS gateway client for phone verification.
//!
//! Implements the verification sequencer's messaging and verification
//! collaborators against the gateway's REST API, and wires a sequencer
//! together from configuration.

pub mod client;
pub mod error;

pub use client::SmsGatewayClient;
pub use error::GatewayError;

use std::sync::Arc;
use tracing::info;
use verification_core::{AttemptLimiter, Config, VerificationSequencer};

/// Build a sequencer that talks to the configured gateway.
///
/// The attempt counter is opened from `config.limiter`, so limits survive a
/// restart unless persistence is disabled.
pub fn connect(config: &Config) -> Result<VerificationSequencer, GatewayError> {
    let client = Arc::new(SmsGatewayClient::from_config(&config.gateway)?);
    let limiter = AttemptLimiter::open(&config.limiter);

    info!(
        gateway = %config.gateway.base_url,
        purpose = %config.verification.purpose,
        "Verification sequencer ready"
    );

    Ok(VerificationSequencer::new(
        client.clone(),
        client,
        limiter,
        &config.verification,
    ))
}
