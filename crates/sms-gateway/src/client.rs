//! SMS gateway REST API client for verification-code operations.

use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use urlencoding::encode;
use verification_core::{
    GatewayConfig, MessagingService, ServiceError, VerificationPurpose, VerificationService,
};

/// SMS gateway client that sends and checks verification codes.
#[derive(Clone)]
pub struct SmsGatewayClient {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl SmsGatewayClient {
    /// Create a new gateway client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Create a client from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let mut client = Self::new(&config.base_url, config.timeout)?;
        client.token = config.token.clone();
        Ok(client)
    }

    /// Authenticate requests with the member's bearer token.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Check if the gateway is healthy.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Ask the gateway to text a fresh code to `phone_number`.
    #[instrument(skip(self))]
    pub async fn send_code(
        &self,
        phone_number: &str,
        purpose: VerificationPurpose,
    ) -> Result<(), GatewayError> {
        let url = format!(
            "{}/v1/sms/{}?purpose={}",
            self.base_url,
            encode(phone_number),
            purpose
        );

        debug!(url = %url, "Sending verification code request");

        let response = self.authorized(self.client.post(&url)).send().await?;
        Self::check(response, "Code send").await?;

        debug!(phone_number = %phone_number, "Verification code request accepted");
        Ok(())
    }

    /// Check `code` against the one last sent to `phone_number`.
    #[instrument(skip(self, code))]
    pub async fn verify_code(
        &self,
        phone_number: &str,
        code: &str,
        purpose: VerificationPurpose,
    ) -> Result<(), GatewayError> {
        let url = format!(
            "{}/v1/sms/{}/verify/{}?purpose={}",
            self.base_url,
            encode(phone_number),
            encode(code),
            purpose
        );

        let response = self.authorized(self.client.post(&url)).send().await?;
        Self::check(response, "Verification").await?;

        debug!(phone_number = %phone_number, "Verification successful");
        Ok(())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn check(response: Response, operation: &str) -> Result<(), GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %body, "{} failed", operation);

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(GatewayError::Unauthorized(status.as_u16()));
        }

        let lowered = body.to_lowercase();
        if lowered.contains("invalid verification code") || lowered.contains("incorrect") {
            return Err(GatewayError::InvalidCode);
        }

        Err(GatewayError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MessagingService for SmsGatewayClient {
    async fn send(
        &self,
        phone_number: &str,
        purpose: VerificationPurpose,
    ) -> Result<(), ServiceError> {
        Ok(self.send_code(phone_number, purpose).await?)
    }
}

#[async_trait]
impl VerificationService for SmsGatewayClient {
    async fn verify(
        &self,
        phone_number: &str,
        code: &str,
        purpose: VerificationPurpose,
    ) -> Result<(), ServiceError> {
        Ok(self.verify_code(phone_number, code, purpose).await?)
    }
}
