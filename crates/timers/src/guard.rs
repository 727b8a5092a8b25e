//! Background execution guard.
//!
//! The guard holds the platform grant that keeps timers firing while the
//! application is in the background. One guard follows exactly one
//! lifecycle model:
//!
//! - **Explicit**: the application calls `start_task` / `stop_task`.
//! - **Automatic**: the application enables the feature, and the grant is
//!   acquired on entering the background and released on returning to the
//!   foreground.
//!
//! Calling an operation of the other model fails with `LifecycleMismatch`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bgtimer_core::{BackgroundExecutionState, Error, LifecycleModel, Result, TimerConfig};
use bgtimer_events::TimerEvent;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::sink::EventSink;

/// Platform permission to keep running in the background.
pub trait BackgroundGrant: Send + Sync {
    /// Acquire the grant for at most `max_hold`.
    ///
    /// # Errors
    ///
    /// Returns `AcquireFailed` if the platform refuses.
    fn acquire(&self, name: &str, max_hold: Duration) -> Result<()>;

    /// Release the grant. Returns `false` if it was not held.
    fn release(&self) -> bool;

    /// Check if the grant is held. Becomes `false` once the platform revokes it.
    fn is_held(&self) -> bool;
}

#[derive(Debug, Default)]
struct Hold {
    name: String,
    since: Option<Instant>,
    max_hold: Duration,
}

/// Grant that lives entirely in the current process.
///
/// Honours the hold limit like a timed wake lock and can be told to refuse
/// the next acquisition or to revoke the current hold.
#[derive(Debug, Default)]
pub struct InProcessGrant {
    hold: Mutex<Hold>,
    deny_next: Mutex<Option<String>>,
    acquisitions: AtomicU64,
    revoked: AtomicBool,
}

impl InProcessGrant {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `acquire` fail with `reason`.
    pub fn deny_next(&self, reason: impl Into<String>) {
        *self.deny_next.lock() = Some(reason.into());
    }

    /// Drop the current hold as the platform would on expiry.
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    /// Name the grant was last acquired under.
    pub fn name(&self) -> Option<String> {
        let hold = self.hold.lock();
        hold.since.map(|_| hold.name.clone())
    }

    /// Number of successful acquisitions.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl BackgroundGrant for InProcessGrant {
    fn acquire(&self, name: &str, max_hold: Duration) -> Result<()> {
        if let Some(reason) = self.deny_next.lock().take() {
            return Err(Error::acquire_failed(reason));
        }

        let mut hold = self.hold.lock();
        hold.name = name.to_string();
        hold.since = Some(Instant::now());
        hold.max_hold = max_hold;
        self.revoked.store(false, Ordering::SeqCst);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> bool {
        let was_held = self.is_held();
        self.hold.lock().since = None;
        self.revoked.store(false, Ordering::SeqCst);
        was_held
    }

    fn is_held(&self) -> bool {
        if self.revoked.load(Ordering::SeqCst) {
            return false;
        }
        let hold = self.hold.lock();
        hold.since.is_some_and(|since| since.elapsed() < hold.max_hold)
    }
}

/// Acquires and releases the background grant and reports transitions.
///
/// Transitions are posted to the sink as `TaskStarted` / `TaskStopped`;
/// refused transitions are returned and also posted as error notifications.
pub struct BackgroundGuard<G> {
    grant: G,
    model: LifecycleModel,
    task_name: String,
    max_hold: Duration,
    state: BackgroundExecutionState,
    held: bool,
    sink: EventSink,
}

impl<G: BackgroundGrant> BackgroundGuard<G> {
    /// Create a guard with the lifecycle model and hold limit from `config`.
    #[must_use]
    pub fn new(config: &TimerConfig, grant: G, sink: EventSink) -> Self {
        Self {
            grant,
            model: config.lifecycle,
            task_name: config.task_name.clone(),
            max_hold: config.wake_lock_timeout(),
            state: BackgroundExecutionState::default(),
            held: false,
            sink,
        }
    }

    /// The lifecycle model this guard follows.
    #[must_use]
    pub const fn model(&self) -> LifecycleModel {
        self.model
    }

    /// Whether the application wants background execution.
    #[must_use]
    pub const fn state(&self) -> BackgroundExecutionState {
        self.state
    }

    /// Whether the guard believes it holds the grant.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.held
    }

    #[must_use]
    pub const fn grant(&self) -> &G {
        &self.grant
    }

    // Explicit model

    /// Acquire the grant on the application's request.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if held, `AcquireFailed` if refused, and
    /// `LifecycleMismatch` under the automatic model.
    pub fn start_task(&mut self) -> Result<()> {
        self.require(LifecycleModel::Explicit, "start_background_task")?;
        self.acquire()
    }

    /// Release the grant on the application's request.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if not held and `LifecycleMismatch` under the
    /// automatic model.
    pub fn stop_task(&mut self) -> Result<()> {
        self.require(LifecycleModel::Explicit, "stop_background_task")?;
        self.release()
    }

    // Automatic model

    /// Allow the grant to be acquired when the application is backgrounded.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleMismatch` under the explicit model.
    pub fn enable(&mut self) -> Result<()> {
        self.require(LifecycleModel::Automatic, "enable_background_execution")?;
        if !self.state.is_enabled() {
            info!("Background execution enabled");
        }
        self.state = BackgroundExecutionState::Enabled;
        Ok(())
    }

    /// Stop acquiring the grant, releasing it if held. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleMismatch` under the explicit model.
    pub fn disable(&mut self) -> Result<()> {
        self.require(LifecycleModel::Automatic, "disable_background_execution")?;
        self.poll_expiry();
        if self.held {
            self.release()?;
        }
        if self.state.is_enabled() {
            info!("Background execution disabled");
        }
        self.state = BackgroundExecutionState::Disabled;
        Ok(())
    }

    /// Platform notification: the application moved to the background.
    ///
    /// Ignored under the explicit model or while disabled.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` or `AcquireFailed` if the grant cannot be taken.
    pub fn on_entered_background(&mut self) -> Result<()> {
        if !self.follows_lifecycle() {
            return Ok(());
        }
        debug!("Entered background, acquiring grant");
        self.acquire()
    }

    /// Platform notification: the application returned to the foreground.
    ///
    /// Ignored under the explicit model or while disabled.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if the grant is not held.
    pub fn on_entered_foreground(&mut self) -> Result<()> {
        if !self.follows_lifecycle() {
            return Ok(());
        }
        debug!("Entered foreground, releasing grant");
        self.release()
    }

    /// Detect a grant the platform revoked behind our back.
    ///
    /// Posts `TaskStopped` and returns `true` the first time it is noticed.
    pub fn poll_expiry(&mut self) -> bool {
        if !self.held || self.grant.is_held() {
            return false;
        }
        self.held = false;
        warn!(task = %self.task_name, "Background grant expired");
        self.sink.emit(TimerEvent::TaskStopped);
        true
    }

    fn follows_lifecycle(&self) -> bool {
        self.model == LifecycleModel::Automatic && self.state.is_enabled()
    }

    fn require(&self, model: LifecycleModel, operation: &'static str) -> Result<()> {
        if self.model == model {
            Ok(())
        } else {
            Err(Error::LifecycleMismatch {
                operation,
                model: self.model,
            })
        }
    }

    fn acquire(&mut self) -> Result<()> {
        self.poll_expiry();
        if self.held {
            return Err(self.report(Error::AlreadyRunning));
        }

        if let Err(err) = self.grant.acquire(&self.task_name, self.max_hold) {
            return Err(self.report(err));
        }

        self.held = true;
        info!(
            task = %self.task_name,
            max_hold_ms = self.max_hold.as_millis(),
            "Background task started"
        );
        self.sink.emit(TimerEvent::TaskStarted);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.poll_expiry();
        if !self.held {
            return Err(self.report(Error::NotRunning));
        }

        self.grant.release();
        self.held = false;
        info!(task = %self.task_name, "Background task stopped");
        self.sink.emit(TimerEvent::TaskStopped);
        Ok(())
    }

    fn report(&self, err: Error) -> Error {
        warn!(error = %err, "Background transition refused");
        if err.is_advisory() {
            self.sink.emit(TimerEvent::from(&err));
        }
        err
    }
}
