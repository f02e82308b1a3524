//! Cancellable, restartable countdown used to expire a sent verification code.
//!
//! At most one countdown is active per timer. Every `start`/`cancel` bumps a
//! generation number under the channel lock, and a tick is only applied when
//! its task's generation is still current, so a late tick from a replaced
//! countdown can never land.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

/// Shortest accepted tick period.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Lifecycle of a countdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimerPhase {
    #[default]
    Idle,
    Running,
    Expired,
}

/// Snapshot published after every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Countdown {
    pub phase: TimerPhase,
    pub remaining: u32,
    generation: u64,
}

impl Countdown {
    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    pub fn is_expired(&self) -> bool {
        self.phase == TimerPhase::Expired
    }
}

/// Receives every countdown change while the timer's lock is held.
///
/// Implementations must not call back into the timer.
pub trait CountdownObserver: Send + Sync + 'static {
    fn on_change(&self, countdown: &Countdown);
}

/// Per-second countdown backed by a tokio task.
pub struct CountdownTimer {
    tx: Arc<watch::Sender<Countdown>>,
    observer: Option<Arc<dyn CountdownObserver>>,
    tick: Duration,
    task: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Create an idle timer ticking every `tick` (at least 1 ms).
    pub fn new(tick: Duration) -> Self {
        if tick < MIN_TICK {
            warn!(?tick, "Tick period too short, using {:?}", MIN_TICK);
        }

        let tick = tick.max(MIN_TICK);
        let (tx, _rx) = watch::channel(Countdown::default());
        Self {
            tx: Arc::new(tx),
            observer: None,
            tick,
            task: None,
        }
    }

    /// Create an idle timer that reports every change to `observer`.
    pub fn with_observer(tick: Duration, observer: Arc<dyn CountdownObserver>) -> Self {
        let mut timer = Self::new(tick);
        timer.observer = Some(observer);
        timer
    }

    /// Watch the countdown value.
    pub fn subscribe(&self) -> watch::Receiver<Countdown> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Countdown {
        *self.tx.borrow()
    }

    /// Begin counting down from `seconds`, discarding any countdown in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, seconds: u32) {
        self.abort_task();

        let observer = self.observer.clone();
        let mut generation = 0;
        self.tx.send_modify(|countdown| {
            countdown.generation += 1;
            countdown.remaining = seconds;
            countdown.phase = if seconds == 0 {
                TimerPhase::Expired
            } else {
                TimerPhase::Running
            };
            generation = countdown.generation;
            notify(&observer, countdown);
        });

        info!(seconds, "Countdown started");

        if seconds == 0 {
            return;
        }

        let tx = self.tx.clone();
        let tick = self.tick;
        self.task = Some(tokio::spawn(async move {
            run_countdown(tx, observer, generation, tick).await;
        }));
    }

    /// Stop the countdown. `remaining` keeps its last value.
    pub fn cancel(&mut self) {
        self.abort_task();

        let observer = self.observer.clone();
        self.tx.send_modify(|countdown| {
            countdown.generation += 1;
            countdown.phase = TimerPhase::Idle;
            notify(&observer, countdown);
        });

        debug!("Countdown cancelled");
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.abort_task();
    }
}

fn notify(observer: &Option<Arc<dyn CountdownObserver>>, countdown: &Countdown) {
    if let Some(observer) = observer {
        observer.on_change(countdown);
    }
}

async fn run_countdown(
    tx: Arc<watch::Sender<Countdown>>,
    observer: Option<Arc<dyn CountdownObserver>>,
    generation: u64,
    tick: Duration,
) {
    let mut ticker = interval_at(Instant::now() + tick, tick);

    loop {
        ticker.tick().await;

        let mut finished = true;
        tx.send_if_modified(|countdown| {
            if countdown.generation != generation || countdown.phase != TimerPhase::Running {
                return false;
            }

            countdown.remaining = countdown.remaining.saturating_sub(1);
            if countdown.remaining == 0 {
                countdown.phase = TimerPhase::Expired;
            } else {
                finished = false;
            }

            notify(&observer, countdown);
            true
        });

        if finished {
            break;
        }
    }

    if tx.borrow().generation == generation {
        info!("Countdown expired");
    }
}
