//! SMS send attempt limiter.
//!
//! Counts verification-code sends in a persisted [`AttemptCounter`]. Once the
//! threshold is reached further sends are denied until the cool-down window,
//! measured from the attempt that hit the threshold, has passed.

use crate::config::LimiterConfig;
use crate::error::StoreError;
use crate::store::{JsonFileStore, MemoryStore, RecordStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Persisted send attempt bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptCounter {
    pub attempt_count: u32,
    /// Start of the current window; `None` before the first attempt
    pub last_attempt: Option<DateTime<Utc>>,
}

/// Why a send was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    TooManyAttempts {
        attempts: u32,
        retry_at: DateTime<Utc>,
    },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::TooManyAttempts { retry_at, .. } => write!(
                f,
                "too many attempts, try again after {}",
                retry_at.format("%H:%M")
            ),
        }
    }
}

/// Outcome of a permit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermitDecision {
    Permitted,
    Denied(DenialReason),
}

impl PermitDecision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, PermitDecision::Permitted)
    }
}

/// Rate limiter for verification-code sends.
#[derive(Clone)]
pub struct AttemptLimiter {
    store: Arc<dyn RecordStore<AttemptCounter>>,
    max_attempts: u32,
    cooldown: ChronoDuration,
}

impl AttemptLimiter {
    /// Create a limiter with the given threshold and cool-down window.
    pub fn new(
        store: Arc<dyn RecordStore<AttemptCounter>>,
        max_attempts: u32,
        cooldown: std::time::Duration,
    ) -> Self {
        Self {
            store,
            max_attempts,
            cooldown: ChronoDuration::from_std(cooldown).unwrap_or(ChronoDuration::MAX),
        }
    }

    /// Create a limiter from configuration.
    pub fn from_config(
        store: Arc<dyn RecordStore<AttemptCounter>>,
        config: &LimiterConfig,
    ) -> Self {
        Self::new(store, config.max_attempts, config.cooldown)
    }

    /// Create a limiter backed by the store `config` selects.
    pub fn open(config: &LimiterConfig) -> Self {
        let store: Arc<dyn RecordStore<AttemptCounter>> = if config.persist {
            info!(path = %config.path.display(), "Using persistent attempt counter");
            Arc::new(JsonFileStore::new(&config.path))
        } else {
            warn!("Attempt counter persistence disabled, limits reset on restart");
            Arc::new(MemoryStore::<AttemptCounter>::new())
        };
        Self::from_config(store, config)
    }

    /// Record a send attempt at `now` and decide whether it may proceed.
    ///
    /// Every call counts, denied ones included.
    pub fn request_permit(&self, now: DateTime<Utc>) -> Result<PermitDecision, StoreError> {
        let mut counter = self.store.load()?.unwrap_or_default();

        let window_elapsed = counter
            .last_attempt
            .map_or(true, |last| now.signed_duration_since(last) > self.cooldown);

        if window_elapsed {
            debug!(previous = counter.attempt_count, "Attempt window reset");
            counter.attempt_count = 0;
            counter.last_attempt = Some(now);
        }

        counter.attempt_count = counter.attempt_count.saturating_add(1);

        if counter.attempt_count == self.max_attempts {
            // Cool-down starts at the attempt that reaches the threshold
            counter.last_attempt = Some(now);
        }

        self.store.save(&counter)?;

        if counter.attempt_count > self.max_attempts {
            let retry_at = counter.last_attempt.unwrap_or(now) + self.cooldown;
            warn!(
                attempts = counter.attempt_count,
                %retry_at,
                "Verification code send denied"
            );
            return Ok(PermitDecision::Denied(DenialReason::TooManyAttempts {
                attempts: counter.attempt_count,
                retry_at,
            }));
        }

        info!(
            attempt = counter.attempt_count,
            max = self.max_attempts,
            "Verification code send permitted"
        );
        Ok(PermitDecision::Permitted)
    }

    /// Current persisted counter.
    pub fn counter(&self) -> Result<AttemptCounter, StoreError> {
        Ok(self.store.load()?.unwrap_or_default())
    }
}
