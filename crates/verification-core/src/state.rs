//! Observable verification snapshot.

use crate::error::VerificationError;
use crate::timer::{Countdown, CountdownObserver};
use crate::validation::PasswordRules;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

/// Category of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    RateLimited,
    NetworkFailure,
    Expired,
    CodeNotRequested,
    StorageFailure,
}

/// Message shown to the user after a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn code_expired() -> Self {
        Self::from(&VerificationError::Expired)
    }
}

impl From<&VerificationError> for Notice {
    fn from(error: &VerificationError) -> Self {
        let kind = match error {
            VerificationError::RateLimited(_) => NoticeKind::RateLimited,
            VerificationError::Network(_) => NoticeKind::NetworkFailure,
            VerificationError::Expired => NoticeKind::Expired,
            VerificationError::CodeNotRequested => NoticeKind::CodeNotRequested,
            VerificationError::Store(_) => NoticeKind::StorageFailure,
        };

        Self {
            kind,
            message: error.to_string(),
        }
    }
}

/// Everything the sign-up screen renders, in one value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationState {
    pub name_valid: bool,
    pub phone_valid: bool,
    pub code_requested: bool,
    pub code_verified: bool,
    pub remaining_seconds: u32,
    pub timer_running: bool,
    pub password_rules: PasswordRules,
    pub passwords_match: bool,
    /// Outcome of the last failed operation, cleared when a new one starts
    pub notice: Option<Notice>,
}

impl VerificationState {
    /// True when every condition for final submission holds.
    pub fn can_submit(&self) -> bool {
        self.name_valid
            && self.phone_valid
            && self.code_verified
            && self.password_rules.all_satisfied()
            && self.passwords_match
    }
}

/// Owns the state channel; also mirrors countdown changes into the snapshot.
pub(crate) struct StatePublisher {
    tx: watch::Sender<VerificationState>,
}

impl StatePublisher {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(VerificationState::default());
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<VerificationState> {
        self.tx.subscribe()
    }

    pub(crate) fn snapshot(&self) -> VerificationState {
        self.tx.borrow().clone()
    }

    /// Apply `modify`, notifying subscribers only if something changed.
    pub(crate) fn update(&self, modify: impl FnOnce(&mut VerificationState)) {
        self.tx.send_if_modified(|state| {
            let before = state.clone();
            modify(state);
            *state != before
        });
    }

    pub(crate) fn timer_expired(&self) {
        info!("Verification code expired");
        self.update(|state| state.notice = Some(Notice::code_expired()));
    }
}

impl CountdownObserver for StatePublisher {
    fn on_change(&self, countdown: &Countdown) {
        debug!(remaining = countdown.remaining, phase = ?countdown.phase, "Countdown tick");
        self.update(|state| {
            state.remaining_seconds = countdown.remaining;
            state.timer_running = countdown.is_running();
        });

        if countdown.is_expired() {
            self.timer_expired();
        }
    }
}
