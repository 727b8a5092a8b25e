//! `BackgroundTimer` - the application-facing facade.
//!
//! Wires the allocator, registry, native bridge, guard and relay together
//! around one native event queue. The facade is the single owner of that
//! queue: native events are applied when the owner calls [`pump`] or runs
//! [`run_for`].
//!
//! [`pump`]: BackgroundTimer::pump
//! [`run_for`]: BackgroundTimer::run_for

use std::sync::Arc;
use std::time::Duration;

use bgtimer_core::{
    BackgroundExecutionState, Error, LifecycleModel, Result, TimerConfig, TimerId, TimerKind,
};
use bgtimer_events::{EventBusBuilder, EventPattern, EventSubscription, TimerEvent};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::bridge::{NativeTimerBridge, TokioTimerBridge};
use crate::guard::{BackgroundGrant, BackgroundGuard, InProcessGrant};
use crate::registry::TimerRegistry;
use crate::relay::EventRelay;
use crate::sink::{EventSink, NativeEvents, native_channel};

/// Convert a caller-supplied millisecond count into a `Duration`.
///
/// # Errors
///
/// Returns `InvalidDuration` for negative, NaN or infinite input.
pub fn duration_from_ms(ms: f64) -> Result<Duration> {
    if !ms.is_finite() {
        return Err(Error::invalid_duration(format!("{ms} is not a finite number")));
    }
    if ms < 0.0 {
        return Err(Error::invalid_duration(format!("{ms} is negative")));
    }
    Duration::try_from_secs_f64(ms / 1000.0).map_err(|e| Error::invalid_duration(e.to_string()))
}

/// Background timer facade.
pub struct BackgroundTimer<G: BackgroundGrant = InProcessGrant> {
    config: TimerConfig,
    registry: TimerRegistry,
    guard: BackgroundGuard<G>,
    relay: EventRelay,
    sink: EventSink,
}

impl BackgroundTimer<InProcessGrant> {
    /// Real-time timer on the current tokio runtime with an in-process grant.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeUnavailable` outside a runtime and `InvalidConfig` if
    /// `config` does not validate.
    pub fn tokio(config: TimerConfig) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| Error::runtime_unavailable(e.to_string()))?;
        Self::with_bridge(config, InProcessGrant::new(), |sink| {
            Arc::new(TokioTimerBridge::new(sink, runtime))
        })
    }
}

impl<G: BackgroundGrant> BackgroundTimer<G> {
    /// Build a timer around a bridge created for the facade's event sink.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` does not validate.
    pub fn with_bridge<B>(
        config: TimerConfig,
        grant: G,
        make_bridge: impl FnOnce(EventSink) -> Arc<B>,
    ) -> Result<Self>
    where
        B: NativeTimerBridge + 'static,
    {
        let (sink, events) = native_channel();
        let bridge: Arc<dyn NativeTimerBridge> = make_bridge(sink.clone());
        Self::from_parts(config, grant, bridge, sink, events)
    }

    /// Build a timer from an existing bridge and the queue it reports into.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` does not validate.
    pub fn from_parts(
        config: TimerConfig,
        grant: G,
        bridge: Arc<dyn NativeTimerBridge>,
        sink: EventSink,
        events: NativeEvents,
    ) -> Result<Self> {
        config.validate()?;

        let bus = Arc::new(
            EventBusBuilder::new()
                .with_channel_capacity(config.notification_capacity)
                .build(),
        );
        let registry = TimerRegistry::new(bridge, sink.clone());
        let guard = BackgroundGuard::new(&config, grant, sink.clone());
        let relay = EventRelay::new(events, registry.clone(), bus);

        info!(
            lifecycle = %config.lifecycle,
            require_active_task = config.require_active_task,
            "Background timer ready"
        );

        Ok(Self {
            config,
            registry,
            guard,
            relay,
            sink,
        })
    }

    // Background execution, automatic model

    /// Enable background execution.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleMismatch` under the explicit model.
    pub fn enable_background_execution(&mut self) -> Result<()> {
        let result = self.guard.enable();
        self.pump();
        result
    }

    /// Disable background execution. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleMismatch` under the explicit model.
    pub fn disable_background_execution(&mut self) -> Result<()> {
        let result = self.guard.disable();
        self.pump();
        result
    }

    /// Platform notification: the application moved to the background.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` or `AcquireFailed` if the grant cannot be taken.
    pub fn on_entered_background(&mut self) -> Result<()> {
        let result = self.guard.on_entered_background();
        self.pump();
        result
    }

    /// Platform notification: the application returned to the foreground.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if the grant is not held.
    pub fn on_entered_foreground(&mut self) -> Result<()> {
        let result = self.guard.on_entered_foreground();
        self.pump();
        result
    }

    // Background execution, explicit model

    /// Acquire the background grant.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning`, `AcquireFailed` or `LifecycleMismatch`.
    pub fn start_background_task(&mut self) -> Result<()> {
        let result = self.guard.start_task();
        self.pump();
        result
    }

    /// Release the background grant. Stopping tears down every timer.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` or `LifecycleMismatch`.
    pub fn stop_background_task(&mut self) -> Result<()> {
        let result = self.guard.stop_task();
        self.pump();
        result
    }

    /// Check whether the platform revoked the grant, tearing down timers if so.
    pub fn poll_expiry(&mut self) -> bool {
        let expired = self.guard.poll_expiry();
        if expired {
            self.pump();
        }
        expired
    }

    // Timers

    /// Schedule `callback` to run once after `delay`.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if an active task is required and not held.
    pub fn set_timeout(
        &self,
        callback: impl FnMut() + Send + 'static,
        delay: Duration,
    ) -> Result<TimerId> {
        self.require_active_task()?;
        self.registry
            .register(Box::new(callback), delay, TimerKind::Timeout)
    }

    /// Schedule `callback` to run every `period` until cleared.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if an active task is required and not held.
    pub fn set_interval(
        &self,
        callback: impl FnMut() + Send + 'static,
        period: Duration,
    ) -> Result<TimerId> {
        self.require_active_task()?;
        self.registry
            .register(Box::new(callback), period, TimerKind::Interval)
    }

    /// [`set_timeout`](Self::set_timeout) with a millisecond count.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDuration` for negative or non-finite input.
    pub fn set_timeout_ms(
        &self,
        callback: impl FnMut() + Send + 'static,
        ms: f64,
    ) -> Result<TimerId> {
        self.set_timeout(callback, duration_from_ms(ms)?)
    }

    /// [`set_interval`](Self::set_interval) with a millisecond count.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDuration` for negative or non-finite input.
    pub fn set_interval_ms(
        &self,
        callback: impl FnMut() + Send + 'static,
        ms: f64,
    ) -> Result<TimerId> {
        self.set_interval(callback, duration_from_ms(ms)?)
    }

    /// Cancel a timeout or interval.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `NotRunning` if an active task
    /// is required and not held.
    pub fn clear_timeout(&self, id: TimerId) -> Result<()> {
        self.require_active_task()?;
        self.registry.cancel(id)
    }

    /// Alias of [`clear_timeout`](Self::clear_timeout).
    ///
    /// # Errors
    ///
    /// Same as `clear_timeout`.
    pub fn clear_interval(&self, id: TimerId) -> Result<()> {
        self.clear_timeout(id)
    }

    // Notifications

    /// Subscribe to every notification.
    pub fn subscribe(&self) -> EventSubscription {
        self.relay.bus().subscribe()
    }

    /// Subscribe to notifications matching `pattern`.
    pub fn subscribe_with_pattern(&self, pattern: EventPattern) -> (String, EventSubscription) {
        self.relay.bus().subscribe_with_pattern(pattern)
    }

    /// Drop a pattern subscription.
    pub fn unsubscribe(&self, subscriber_id: &str) -> bool {
        self.relay.bus().unsubscribe(subscriber_id)
    }

    /// Install the error listener.
    pub fn on_error(&mut self, listener: impl FnMut(&str) + Send + 'static) {
        self.relay.on_error(listener);
    }

    // Driving

    /// Apply every queued native event. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        self.relay.drain()
    }

    /// Apply native events as they arrive for `duration` of runtime time.
    ///
    /// Returns how many were applied.
    pub async fn run_for(&mut self, duration: Duration) -> usize {
        let mut applied = self.pump();
        applied = applied.saturating_add(self.relay.run_until(tokio::time::sleep(duration)).await);
        self.poll_expiry();
        applied = applied.saturating_add(self.pump());
        debug!(applied, run_ms = duration.as_millis(), "Run finished");
        applied
    }

    // Inspection

    /// Registry handle. Clones of it can be moved into callbacks.
    #[must_use]
    pub const fn registry(&self) -> &TimerRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn state(&self) -> BackgroundExecutionState {
        self.guard.state()
    }

    #[must_use]
    pub const fn lifecycle(&self) -> LifecycleModel {
        self.guard.model()
    }

    /// Whether the background grant is held.
    #[must_use]
    pub const fn is_task_running(&self) -> bool {
        self.guard.is_held()
    }

    #[must_use]
    pub const fn config(&self) -> &TimerConfig {
        &self.config
    }

    #[must_use]
    pub const fn grant(&self) -> &G {
        self.guard.grant()
    }

    /// Sink native collaborators report into.
    #[must_use]
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    fn require_active_task(&self) -> Result<()> {
        if !self.config.require_active_task || self.guard.is_held() {
            return Ok(());
        }
        let err = Error::NotRunning;
        self.sink.emit(TimerEvent::from(&err));
        Err(err)
    }
}
