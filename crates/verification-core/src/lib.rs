//! Registration and phone verification sequencing for field workers.
//!
//! Name, phone and password inputs are validated as they change, SMS code
//! sends are rate limited through a persisted attempt counter, and a sent code
//! expires when its countdown reaches zero. All of it is observable as one
//! [`VerificationState`] snapshot.

pub mod config;
mod error;
mod limiter;
mod sequencer;
mod services;
mod session;
mod state;
mod store;
mod timer;
pub mod validation;

pub use config::{Config, GatewayConfig, LimiterConfig, SessionConfig, VerificationConfig};
pub use error::{ServiceError, StoreError, VerificationError, VerificationResult};
pub use limiter::{AttemptCounter, AttemptLimiter, DenialReason, PermitDecision};
pub use sequencer::{Clock, Submission, SystemClock, VerificationSequencer};
pub use services::{MessagingService, VerificationPurpose, VerificationService};
pub use session::{MemberProfile, SessionContext};
pub use state::{Notice, NoticeKind, VerificationState};
pub use store::{JsonFileStore, MemoryStore, RecordStore};
pub use timer::{Countdown, CountdownObserver, CountdownTimer, TimerPhase};
pub use validation::PasswordRules;
