//! Registration/verification sequencer.
//!
//! Drives the sign-up (or password-reset) form: validators update condition
//! flags, the attempt limiter gates code sends, the countdown expires a sent
//! code, and every change lands in one [`VerificationState`] snapshot.

use crate::config::VerificationConfig;
use crate::error::{VerificationError, VerificationResult};
use crate::limiter::{AttemptLimiter, PermitDecision};
use crate::services::{MessagingService, VerificationPurpose, VerificationService};
use crate::state::{Notice, StatePublisher, VerificationState};
use crate::timer::CountdownTimer;
use crate::validation::{
    validate_confirm_password, validate_name, validate_password_rules, validate_phone,
};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, instrument, warn};

/// Source of the current time for limiter decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Validated form contents, available once every condition holds.
#[derive(Debug)]
pub struct Submission {
    pub name: String,
    pub phone_number: String,
    pub password: SecretString,
}

/// Single-owner coordinator for one verification form.
pub struct VerificationSequencer {
    purpose: VerificationPurpose,
    messaging: Arc<dyn MessagingService>,
    verifier: Arc<dyn VerificationService>,
    limiter: AttemptLimiter,
    timer: CountdownTimer,
    publisher: Arc<StatePublisher>,
    clock: Arc<dyn Clock>,
    code_ttl_secs: u32,
    name: String,
    password: SecretString,
    confirm: Option<SecretString>,
    /// Number the outstanding code was sent to
    requested_phone: Option<String>,
}

impl VerificationSequencer {
    /// Create a sequencer with an empty form.
    pub fn new(
        messaging: Arc<dyn MessagingService>,
        verifier: Arc<dyn VerificationService>,
        limiter: AttemptLimiter,
        config: &VerificationConfig,
    ) -> Self {
        let publisher = Arc::new(StatePublisher::new());
        let timer = CountdownTimer::with_observer(config.tick, publisher.clone());

        Self {
            purpose: config.purpose,
            messaging,
            verifier,
            limiter,
            timer,
            publisher,
            clock: Arc::new(SystemClock),
            code_ttl_secs: config.code_ttl_secs(),
            name: String::new(),
            password: SecretString::new(String::new()),
            confirm: None,
            requested_phone: None,
        }
    }

    /// Use a different clock for limiter decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn purpose(&self) -> VerificationPurpose {
        self.purpose
    }

    /// Current snapshot.
    pub fn state(&self) -> VerificationState {
        self.publisher.snapshot()
    }

    /// Watch the snapshot; the receiver is notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<VerificationState> {
        self.publisher.subscribe()
    }

    /// Snapshot stream starting with the current value.
    pub fn state_stream(&self) -> WatchStream<VerificationState> {
        WatchStream::new(self.subscribe())
    }

    pub fn on_name_changed(&mut self, name: &str) {
        self.name = name.to_string();
        let valid = validate_name(name);
        self.publisher.update(|state| state.name_valid = valid);
    }

    /// Editing the number away from the one a code was sent to discards
    /// that code and any verification of it.
    pub fn on_phone_changed(&mut self, phone_number: &str) {
        let valid = validate_phone(phone_number);

        let stale = self
            .requested_phone
            .as_deref()
            .is_some_and(|sent| sent != phone_number);
        if stale {
            debug!("Phone number changed, discarding outstanding code");
            self.requested_phone = None;
            self.timer.cancel();
        }

        self.publisher.update(|state| {
            state.phone_valid = valid;
            if stale {
                state.code_requested = false;
                state.code_verified = false;
            }
        });
    }

    pub fn on_password_changed(&mut self, password: &str) {
        self.password = SecretString::new(password.to_string());
        let rules = validate_password_rules(password);
        let matches = self
            .confirm
            .as_ref()
            .is_some_and(|confirm| validate_confirm_password(password, confirm.expose_secret()));

        self.publisher.update(|state| {
            state.password_rules = rules;
            state.passwords_match = matches;
        });
    }

    pub fn on_confirm_password_changed(&mut self, password: &str, confirm: &str) {
        self.confirm = Some(SecretString::new(confirm.to_string()));
        let matches = validate_confirm_password(password, confirm);
        self.publisher.update(|state| state.passwords_match = matches);
    }

    /// Send a fresh verification code if the attempt limiter allows it.
    ///
    /// On success the countdown restarts at the code lifetime and any earlier
    /// verification is invalidated. A failed send leaves the outstanding code
    /// and its countdown alone.
    #[instrument(skip(self), fields(purpose = %self.purpose))]
    pub async fn request_code(&mut self, phone_number: &str) -> VerificationResult<()> {
        self.clear_notice();

        let decision = match self.limiter.request_permit(self.clock.now()) {
            Ok(decision) => decision,
            Err(e) => return self.fail(e.into()),
        };

        if let PermitDecision::Denied(reason) = decision {
            return self.fail(VerificationError::RateLimited(reason));
        }

        if let Err(e) = self.messaging.send(phone_number, self.purpose).await {
            warn!(error = %e, "Verification code send failed");
            return self.fail(e.into());
        }

        self.requested_phone = Some(phone_number.to_string());
        self.publisher.update(|state| {
            state.code_requested = true;
            state.code_verified = false;
        });
        self.timer.start(self.code_ttl_secs);

        info!("Verification code sent");
        Ok(())
    }

    /// Check `code` with the backend and stop the countdown on success.
    #[instrument(skip(self, code), fields(purpose = %self.purpose))]
    pub async fn verify_code(&mut self, phone_number: &str, code: &str) -> VerificationResult<()> {
        self.clear_notice();

        if self.requested_phone.as_deref() != Some(phone_number) {
            return self.fail(VerificationError::CodeNotRequested);
        }

        if self.timer.current().is_expired() {
            return self.fail(VerificationError::Expired);
        }

        if let Err(e) = self.verifier.verify(phone_number, code, self.purpose).await {
            warn!(error = %e, "Verification code rejected");
            return self.fail(e.into());
        }

        self.timer.cancel();
        self.publisher.update(|state| {
            state.code_verified = true;
            // Expiry may have landed while the backend was answering
            state.notice = None;
        });

        info!("Phone number verified");
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        self.publisher.snapshot().can_submit()
    }

    /// Surface the "code expired" notice. Request/verify flags are kept.
    pub fn on_timer_expired(&self) {
        self.publisher.timer_expired();
    }

    /// Form contents, if every submission condition holds.
    ///
    /// The phone number is the one the verified code was sent to.
    pub fn submission(&self) -> Option<Submission> {
        let confirmed = self
            .confirm
            .as_ref()
            .is_some_and(|confirm| confirm.expose_secret() == self.password.expose_secret());

        if !self.can_submit() || !confirmed {
            debug!("Submission requested before all conditions hold");
            return None;
        }

        Some(Submission {
            name: self.name.trim().to_string(),
            phone_number: self.requested_phone.clone()?,
            password: SecretString::new(self.password.expose_secret().clone()),
        })
    }

    fn clear_notice(&self) {
        self.publisher.update(|state| state.notice = None);
    }

    fn fail(&self, error: VerificationError) -> VerificationResult<()> {
        let notice = Notice::from(&error);
        self.publisher.update(|state| state.notice = Some(notice));
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::limiter::AttemptCounter;
    use crate::services::{MockMessagingService, MockVerificationService};
    use crate::state::NoticeKind;
    use crate::store::{MemoryStore, RecordStore};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    const PHONE: &str = "010-1111-2222";

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc.with_ymd_and_hms(2024, 5, 20, 14, 0, 0).unwrap()),
            })
        }

        fn advance(&self, by: ChronoDuration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn sending_ok(times: usize) -> MockMessagingService {
        let mut messaging = MockMessagingService::new();
        messaging
            .expect_send()
            .withf(|phone, purpose| phone == PHONE && *purpose == VerificationPurpose::SignUp)
            .times(times)
            .returning(|_, _| Ok(()));
        messaging
    }

    fn verifying(result: Result<(), ServiceError>, times: usize) -> MockVerificationService {
        let mut verifier = MockVerificationService::new();
        verifier
            .expect_verify()
            .times(times)
            .returning(move |_, _, _| result.clone());
        verifier
    }

    fn sequencer_with_store(
        messaging: MockMessagingService,
        verifier: MockVerificationService,
        store: Arc<dyn RecordStore<AttemptCounter>>,
        clock: Arc<ManualClock>,
    ) -> VerificationSequencer {
        let limiter = AttemptLimiter::new(store, 3, Duration::from_secs(3600));
        VerificationSequencer::new(
            Arc::new(messaging),
            Arc::new(verifier),
            limiter,
            &VerificationConfig::default(),
        )
        .with_clock(clock)
    }

    fn sequencer(
        messaging: MockMessagingService,
        verifier: MockVerificationService,
    ) -> VerificationSequencer {
        sequencer_with_store(
            messaging,
            verifier,
            Arc::new(MemoryStore::<AttemptCounter>::new()),
            ManualClock::new(),
        )
    }

    async fn wait_for_state(
        rx: &mut watch::Receiver<VerificationState>,
        done: impl FnMut(&VerificationState) -> bool,
    ) -> VerificationState {
        rx.wait_for(done).await.unwrap().clone()
    }

    #[test]
    fn test_name_changes_are_idempotent() {
        let mut seq = sequencer(sending_ok(0), verifying(Ok(()), 0));

        seq.on_name_changed("Kim Minji");
        let once = seq.state();
        seq.on_name_changed("Kim Minji");

        assert!(once.name_valid);
        assert_eq!(seq.state(), once);

        seq.on_name_changed("   ");
        assert!(!seq.state().name_valid);
    }

    #[test]
    fn test_phone_and_password_flags() {
        let mut seq = sequencer(sending_ok(0), verifying(Ok(()), 0));

        seq.on_phone_changed(PHONE);
        assert!(seq.state().phone_valid);
        seq.on_phone_changed("02-1234-5678");
        assert!(!seq.state().phone_valid);

        seq.on_password_changed("abcDEF12!");
        assert!(seq.state().password_rules.all_satisfied());

        // Rules are recomputed from scratch on every change
        seq.on_password_changed("abc");
        assert_eq!(seq.state().password_rules.as_array(), [false; 4]);

        seq.on_confirm_password_changed("abcDEF12!", "abcDEF12!");
        assert!(seq.state().passwords_match);
        seq.on_confirm_password_changed("abcDEF12!", "abcDEF12?");
        assert!(!seq.state().passwords_match);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_code_starts_countdown() {
        let mut seq = sequencer(sending_ok(1), verifying(Ok(()), 0));
        seq.on_phone_changed(PHONE);

        seq.request_code(PHONE).await.unwrap();

        let state = seq.state();
        assert!(state.phone_valid);
        assert!(state.code_requested);
        assert!(!state.code_verified);
        assert!(state.timer_running);
        assert_eq!(state.remaining_seconds, 180);
        assert!(state.notice.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_code_denied_leaves_state_unchanged() {
        let clock = ManualClock::new();
        let store = Arc::new(MemoryStore::with_record(AttemptCounter {
            attempt_count: 3,
            last_attempt: Some(clock.now() - ChronoDuration::minutes(30)),
        }));
        let mut seq = sequencer_with_store(sending_ok(0), verifying(Ok(()), 0), store, clock);

        let err = seq.request_code(PHONE).await.unwrap_err();
        assert!(matches!(err, VerificationError::RateLimited(_)));

        let state = seq.state();
        assert!(!state.code_requested);
        assert!(!state.timer_running);
        assert_eq!(state.remaining_seconds, 0);
        assert_eq!(state.notice.unwrap().kind, NoticeKind::RateLimited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_send_within_hour_denied() {
        let clock = ManualClock::new();
        let mut seq = sequencer_with_store(
            sending_ok(4),
            verifying(Ok(()), 0),
            Arc::new(MemoryStore::<AttemptCounter>::new()),
            clock.clone(),
        );

        for _ in 0..3 {
            seq.request_code(PHONE).await.unwrap();
            clock.advance(ChronoDuration::minutes(1));
        }

        clock.advance(ChronoDuration::minutes(30));
        assert!(matches!(
            seq.request_code(PHONE).await,
            Err(VerificationError::RateLimited(_))
        ));

        clock.advance(ChronoDuration::minutes(31));
        seq.request_code(PHONE).await.unwrap();
        assert!(seq.state().notice.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_surfaces_network_notice() {
        let mut messaging = MockMessagingService::new();
        messaging
            .expect_send()
            .times(1)
            .returning(|_, _| Err(ServiceError::Network("connection refused".into())));
        let mut seq = sequencer(messaging, verifying(Ok(()), 0));

        let err = seq.request_code(PHONE).await.unwrap_err();
        assert!(matches!(err, VerificationError::Network(ServiceError::Network(_))));

        let state = seq.state();
        assert!(!state.code_requested);
        assert!(!state.timer_running);
        assert_eq!(state.notice.unwrap().kind, NoticeKind::NetworkFailure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_without_request() {
        let mut seq = sequencer(sending_ok(0), verifying(Ok(()), 0));

        let err = seq.verify_code(PHONE, "123456").await.unwrap_err();
        assert!(matches!(err, VerificationError::CodeNotRequested));
        assert!(!seq.state().code_verified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_success_freezes_countdown() {
        let mut seq = sequencer(sending_ok(1), verifying(Ok(()), 1));
        let mut rx = seq.subscribe();

        seq.request_code(PHONE).await.unwrap();
        wait_for_state(&mut rx, |s| s.remaining_seconds == 170).await;

        seq.verify_code(PHONE, "123456").await.unwrap();

        let state = seq.state();
        assert!(state.code_verified);
        assert!(!state.timer_running);
        assert_eq!(state.remaining_seconds, 170);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(seq.state().remaining_seconds, 170);
        assert!(seq.state().notice.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_failure_keeps_countdown_running() {
        let mut seq = sequencer(
            sending_ok(1),
            verifying(Err(ServiceError::Rejected("Invalid verification code".into())), 1),
        );

        seq.request_code(PHONE).await.unwrap();
        let err = seq.verify_code(PHONE, "000000").await.unwrap_err();
        assert!(matches!(err, VerificationError::Network(ServiceError::Rejected(_))));

        let state = seq.state();
        assert!(!state.code_verified);
        assert!(state.timer_running);
        assert_eq!(state.notice.unwrap().kind, NoticeKind::NetworkFailure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_surfaces_notice_and_blocks_verify() {
        let mut seq = sequencer(sending_ok(1), verifying(Ok(()), 0));
        let mut rx = seq.subscribe();

        seq.request_code(PHONE).await.unwrap();
        let expired = wait_for_state(&mut rx, |s| s.notice.is_some()).await;

        assert_eq!(expired.notice.unwrap().kind, NoticeKind::Expired);
        assert_eq!(expired.remaining_seconds, 0);
        assert!(!expired.timer_running);
        assert!(expired.code_requested);

        let err = seq.verify_code(PHONE, "123456").await.unwrap_err();
        assert!(matches!(err, VerificationError::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_after_expiry_restarts_countdown() {
        let mut seq = sequencer(sending_ok(2), verifying(Ok(()), 1));
        let mut rx = seq.subscribe();

        seq.request_code(PHONE).await.unwrap();
        wait_for_state(&mut rx, |s| s.remaining_seconds == 0).await;

        seq.request_code(PHONE).await.unwrap();
        let state = seq.state();
        assert!(state.timer_running);
        assert_eq!(state.remaining_seconds, 180);
        assert!(state.notice.is_none());

        seq.verify_code(PHONE, "654321").await.unwrap();
        assert!(seq.state().code_verified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_invalidates_previous_verification() {
        let mut seq = sequencer(sending_ok(2), verifying(Ok(()), 1));

        seq.request_code(PHONE).await.unwrap();
        seq.verify_code(PHONE, "123456").await.unwrap();
        assert!(seq.state().code_verified);

        seq.request_code(PHONE).await.unwrap();
        assert!(!seq.state().code_verified);
        assert!(seq.state().timer_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_expiry_notice_keeps_flags() {
        let mut seq = sequencer(sending_ok(1), verifying(Ok(()), 1));

        seq.request_code(PHONE).await.unwrap();
        seq.verify_code(PHONE, "123456").await.unwrap();
        seq.on_timer_expired();

        let state = seq.state();
        assert!(state.code_requested);
        assert!(state.code_verified);
        assert_eq!(state.notice.unwrap().kind, NoticeKind::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_submission() {
        let mut seq = sequencer(sending_ok(1), verifying(Ok(()), 1));

        seq.on_phone_changed(PHONE);
        seq.request_code(PHONE).await.unwrap();
        seq.verify_code(PHONE, "123456").await.unwrap();

        // Verified phone alone is not enough
        assert!(!seq.can_submit());
        assert!(seq.submission().is_none());

        seq.on_name_changed(" Kim Minji ");
        seq.on_password_changed("abcDEF12!");
        assert!(!seq.can_submit());
        seq.on_confirm_password_changed("abcDEF12!", "abcDEF12!");
        assert!(seq.can_submit());

        let submission = seq.submission().unwrap();
        assert_eq!(submission.name, "Kim Minji");
        assert_eq!(submission.phone_number, PHONE);
        assert_eq!(submission.password.expose_secret(), "abcDEF12!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_purpose_is_forwarded() {
        let mut messaging = MockMessagingService::new();
        messaging
            .expect_send()
            .withf(|_, purpose| *purpose == VerificationPurpose::PasswordReset)
            .times(1)
            .returning(|_, _| Ok(()));
        let mut verifier = MockVerificationService::new();
        verifier
            .expect_verify()
            .withf(|phone, code, purpose| {
                phone == PHONE && code == "123456" && *purpose == VerificationPurpose::PasswordReset
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let config = VerificationConfig {
            purpose: VerificationPurpose::PasswordReset,
            ..Default::default()
        };
        let limiter = AttemptLimiter::new(
            Arc::new(MemoryStore::<AttemptCounter>::new()),
            3,
            Duration::from_secs(3600),
        );
        let mut seq =
            VerificationSequencer::new(Arc::new(messaging), Arc::new(verifier), limiter, &config);

        assert_eq!(seq.purpose(), VerificationPurpose::PasswordReset);
        seq.request_code(PHONE).await.unwrap();
        seq.verify_code(PHONE, "123456").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_stream_emits_changes() {
        let mut seq = sequencer(sending_ok(0), verifying(Ok(()), 0));
        let mut stream = seq.state_stream();

        let initial = stream.next().await.unwrap();
        assert!(!initial.name_valid);

        seq.on_name_changed("Lee");
        let updated = stream.next().await.unwrap();
        assert!(updated.name_valid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_resend_keeps_outstanding_code_expiring() {
        let sends = std::sync::atomic::AtomicUsize::new(0);
        let mut messaging = MockMessagingService::new();
        messaging.expect_send().times(2).returning(move |_, _| {
            if sends.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                Ok(())
            } else {
                Err(ServiceError::Network("connection reset".into()))
            }
        });
        let mut seq = sequencer(messaging, verifying(Ok(()), 0));
        let mut rx = seq.subscribe();

        seq.request_code(PHONE).await.unwrap();
        wait_for_state(&mut rx, |s| s.remaining_seconds == 130).await;

        assert!(seq.request_code(PHONE).await.is_err());
        let state = seq.state();
        assert!(state.code_requested);
        assert!(state.timer_running);
        assert_eq!(state.remaining_seconds, 130);

        let expired = wait_for_state(&mut rx, |s| !s.timer_running).await;
        assert_eq!(expired.remaining_seconds, 0);

        let err = seq.verify_code(PHONE, "123456").await.unwrap_err();
        assert!(matches!(err, VerificationError::Expired));
        assert!(!seq.state().code_verified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phone_change_discards_verification() {
        let mut seq = sequencer(sending_ok(1), verifying(Ok(()), 1));

        seq.on_name_changed("Kim Minji");
        seq.on_password_changed("abcDEF12!");
        seq.on_confirm_password_changed("abcDEF12!", "abcDEF12!");
        seq.on_phone_changed(PHONE);
        seq.request_code(PHONE).await.unwrap();
        seq.verify_code(PHONE, "123456").await.unwrap();

        // Re-entering the same number keeps the verification
        seq.on_phone_changed(PHONE);
        assert!(seq.can_submit());

        seq.on_phone_changed("019-9999-8888");
        let state = seq.state();
        assert!(state.phone_valid);
        assert!(!state.code_requested);
        assert!(!state.code_verified);
        assert!(!seq.can_submit());
        assert!(seq.submission().is_none());

        let err = seq.verify_code("019-9999-8888", "123456").await.unwrap_err();
        assert!(matches!(err, VerificationError::CodeNotRequested));
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_for_other_number_rejected() {
        let mut seq = sequencer(sending_ok(1), verifying(Ok(()), 0));

        seq.request_code(PHONE).await.unwrap();
        let err = seq.verify_code("019-9999-8888", "123456").await.unwrap_err();

        assert!(matches!(err, VerificationError::CodeNotRequested));
        assert!(seq.state().timer_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_password_change_after_confirm_needs_reconfirm() {
        let mut seq = sequencer(sending_ok(1), verifying(Ok(()), 1));

        seq.on_name_changed("Kim Minji");
        seq.on_phone_changed(PHONE);
        seq.request_code(PHONE).await.unwrap();
        seq.verify_code(PHONE, "123456").await.unwrap();
        seq.on_password_changed("abcDEF12!");
        seq.on_confirm_password_changed("abcDEF12!", "abcDEF12!");
        assert!(seq.can_submit());

        seq.on_password_changed("zzzQQQ99?");
        assert!(!seq.state().passwords_match);
        assert!(!seq.can_submit());
        assert!(seq.submission().is_none());

        seq.on_confirm_password_changed("zzzQQQ99?", "zzzQQQ99?");
        let submission = seq.submission().unwrap();
        assert_eq!(submission.password.expose_secret(), "zzzQQQ99?");

        // Typing the confirmed password back restores the match
        seq.on_password_changed("zzzQQQ9");
        seq.on_password_changed("zzzQQQ99?");
        assert!(seq.state().passwords_match);
    }

    struct SlowVerifier {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl VerificationService for SlowVerifier {
        async fn verify(
            &self,
            _phone_number: &str,
            _code: &str,
            _purpose: VerificationPurpose,
        ) -> Result<(), ServiceError> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_success_clears_expiry_landing_mid_call() {
        let limiter = AttemptLimiter::new(
            Arc::new(MemoryStore::<AttemptCounter>::new()),
            3,
            Duration::from_secs(3600),
        );
        let mut seq = VerificationSequencer::new(
            Arc::new(sending_ok(1)),
            Arc::new(SlowVerifier {
                delay: Duration::from_secs(5),
            }),
            limiter,
            &VerificationConfig::default(),
        );
        let mut rx = seq.subscribe();

        seq.request_code(PHONE).await.unwrap();
        wait_for_state(&mut rx, |s| s.remaining_seconds == 1).await;

        seq.verify_code(PHONE, "123456").await.unwrap();

        let state = seq.state();
        assert!(state.code_verified);
        assert!(!state.timer_running);
        assert!(state.notice.is_none());
    }
}
