//! Configuration loaded from environment variables.

use crate::services::VerificationPurpose;
use anyhow::{ensure, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Verification flow configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Code expiry and countdown configuration
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Send attempt limiting configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// SMS gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session persistence configuration
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// How long a sent code stays valid
    #[serde(default = "default_code_ttl", with = "humantime_serde")]
    pub code_ttl: Duration,

    /// Countdown tick period
    #[serde(default = "default_tick", with = "humantime_serde")]
    pub tick: Duration,

    /// Purpose forwarded to the gateway
    #[serde(default)]
    pub purpose: VerificationPurpose,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    /// Sends allowed per window
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Window after which the counter resets
    #[serde(default = "default_cooldown", with = "humantime_serde")]
    pub cooldown: Duration,

    /// Path of the persisted attempt counter
    #[serde(default = "default_attempts_path")]
    pub path: PathBuf,

    /// Enable persistence (if false, the counter is in-memory only)
    #[serde(default = "default_true")]
    pub persist: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// SMS gateway REST API URL
    #[serde(default = "default_gateway_url")]
    pub base_url: String,

    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Bearer token of the signed-in member, if the gateway requires one
    #[serde(default)]
    pub token: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Path of the persisted member profile
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

// Default implementations
impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl: default_code_ttl(),
            tick: default_tick(),
            purpose: VerificationPurpose::default(),
        }
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            cooldown: default_cooldown(),
            path: default_attempts_path(),
            persist: true,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            timeout: default_timeout(),
            token: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

impl VerificationConfig {
    /// Countdown length in whole seconds.
    pub fn code_ttl_secs(&self) -> u32 {
        u32::try_from(self.code_ttl.as_secs()).unwrap_or(u32::MAX)
    }
}

// Default value functions
fn default_code_ttl() -> Duration {
    Duration::from_secs(180)
}

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_cooldown() -> Duration {
    Duration::from_secs(60 * 60) // 1 hour
}

fn default_attempts_path() -> PathBuf {
    PathBuf::from("/data/sms-attempts.json")
}

fn default_true() -> bool {
    true
}

fn default_gateway_url() -> String {
    "http://localhost:8080".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_session_path() -> PathBuf {
    PathBuf::from("/data/session.json")
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the countdown cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.verification.tick.is_zero(),
            "VERIFICATION__TICK must be greater than zero"
        );
        Ok(())
    }
}
