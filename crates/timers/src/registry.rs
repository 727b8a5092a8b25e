//! Timer registry and replay protocol.
//!
//! The registry owns every `id -> registration` mapping on the application
//! side and decides what a native fire means:
//!
//! - **timeout**: invoke the callback once, then remove the registration
//! - **interval**: invoke the callback, then re-arm a one-shot native timer
//!   under the same id for the same period
//!
//! The repeat decision is snapshotted before the callback runs. A callback
//! may clear its own id or register new timers; clearing wins over re-arming.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bgtimer_core::{Error, Result, TimerId, TimerKind};
use bgtimer_events::TimerEvent;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::allocator::IdAllocator;
use crate::bridge::NativeTimerBridge;
use crate::sink::EventSink;

/// Shortest period an interval is re-armed with.
///
/// A zero-length interval would otherwise fire without ever yielding.
pub const MIN_INTERVAL_PERIOD: Duration = Duration::from_millis(1);

/// Application callback invoked when a timer fires.
pub type TimerCallback = Box<dyn FnMut() + Send + 'static>;

struct Registration {
    kind: TimerKind,
    period: Duration,
    /// `None` while the callback is running.
    callback: Option<TimerCallback>,
}

struct RegistryState {
    ids: IdAllocator,
    entries: HashMap<TimerId, Registration>,
}

/// Read-only view of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationInfo {
    pub id: TimerId,
    pub kind: TimerKind,
    pub period: Duration,
    /// The callback is executing right now.
    pub firing: bool,
}

/// What a native fire resulted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// No registration for the id (already cleared or completed).
    Ignored,
    /// Timeout callback ran and the registration was removed.
    Completed,
    /// Interval callback ran and a new native timer was armed.
    Rearmed,
    /// The callback cleared its own registration.
    ClearedDuringCallback,
}

/// Timer registry handle.
///
/// Cloning yields another handle to the same registry, which is how
/// callbacks clear or schedule timers from inside a fire.
#[derive(Clone)]
pub struct TimerRegistry {
    state: Arc<Mutex<RegistryState>>,
    bridge: Arc<dyn NativeTimerBridge>,
    sink: EventSink,
}

impl fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("len", &self.len())
            .field("armed", &self.bridge.armed_count())
            .finish()
    }
}

impl TimerRegistry {
    /// Create a registry with a fresh allocator.
    #[must_use]
    pub fn new(bridge: Arc<dyn NativeTimerBridge>, sink: EventSink) -> Self {
        Self::with_allocator(IdAllocator::new(), bridge, sink)
    }

    /// Create a registry that issues ids from `ids`.
    #[must_use]
    pub fn with_allocator(
        ids: IdAllocator,
        bridge: Arc<dyn NativeTimerBridge>,
        sink: EventSink,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState {
                ids,
                entries: HashMap::new(),
            })),
            bridge,
            sink,
        }
    }

    /// Register a callback and arm its first native timer.
    ///
    /// Returns as soon as the timer is armed.
    ///
    /// # Errors
    ///
    /// Returns `IdsExhausted` if no identifier is left.
    pub fn register(
        &self,
        callback: TimerCallback,
        period: Duration,
        kind: TimerKind,
    ) -> Result<TimerId> {
        let period = match kind {
            TimerKind::Timeout => period,
            TimerKind::Interval => period.max(MIN_INTERVAL_PERIOD),
        };

        let id = {
            let mut state = self.state.lock();
            let id = state.ids.next_id()?;
            state.entries.insert(
                id,
                Registration {
                    kind,
                    period,
                    callback: Some(callback),
                },
            );
            id
        };

        self.bridge.arm(id, period);
        info!(timer_id = %id, %kind, period_ms = period.as_millis(), "Timer registered");
        Ok(id)
    }

    /// Clear a registration and disarm its native timer.
    ///
    /// Exactly one `TimeoutCleared` notification follows a successful clear:
    /// from the bridge if a native timer was armed, otherwise from here.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id was never issued or is already gone. The
    /// same condition is posted as an error notification.
    pub fn cancel(&self, id: TimerId) -> Result<()> {
        let removed = self.state.lock().entries.remove(&id);
        if removed.is_none() {
            let err = Error::not_found(id);
            debug!(timer_id = %id, "Clear requested for unknown timer");
            self.sink.emit(TimerEvent::from(&err));
            return Err(err);
        }

        if !self.bridge.disarm(id) {
            self.sink.emit(TimerEvent::TimeoutCleared { id });
        }
        info!(timer_id = %id, "Timer cleared");
        Ok(())
    }

    /// Apply the replay protocol to a native fire.
    pub fn on_native_fire(&self, id: TimerId) -> FireOutcome {
        let (mut callback, kind, period) = {
            let mut state = self.state.lock();
            let Some(entry) = state.entries.get_mut(&id) else {
                debug!(timer_id = %id, "Fire for unknown timer ignored");
                return FireOutcome::Ignored;
            };
            let Some(callback) = entry.callback.take() else {
                warn!(timer_id = %id, "Fire while callback is running ignored");
                return FireOutcome::Ignored;
            };
            (callback, entry.kind, entry.period)
        };

        debug!(timer_id = %id, %kind, "Invoking timer callback");
        callback();

        let outcome = {
            let mut state = self.state.lock();
            match (state.entries.get_mut(&id), kind) {
                (None, _) => FireOutcome::ClearedDuringCallback,
                (Some(entry), TimerKind::Interval) => {
                    entry.callback = Some(callback);
                    FireOutcome::Rearmed
                }
                (Some(_), TimerKind::Timeout) => {
                    state.entries.remove(&id);
                    FireOutcome::Completed
                }
            }
        };

        if outcome == FireOutcome::Rearmed {
            self.bridge.arm(id, period);
        }
        debug!(timer_id = %id, ?outcome, "Fire handled");
        outcome
    }

    /// Remove every registration and disarm its native timer.
    ///
    /// Returns how many registrations were removed.
    pub fn clear_all(&self) -> usize {
        let ids: Vec<TimerId> = {
            let mut state = self.state.lock();
            state.entries.drain().map(|(id, _)| id).collect()
        };

        for id in &ids {
            if !self.bridge.disarm(*id) {
                self.sink.emit(TimerEvent::TimeoutCleared { id: *id });
            }
        }

        if !ids.is_empty() {
            info!(cleared = ids.len(), "All timers cleared");
        }
        ids.len()
    }

    /// Check if a registration exists for `id`.
    pub fn contains(&self, id: TimerId) -> bool {
        self.state.lock().entries.contains_key(&id)
    }

    /// Look up a registration.
    pub fn get(&self, id: TimerId) -> Option<RegistrationInfo> {
        self.state.lock().entries.get(&id).map(|entry| RegistrationInfo {
            id,
            kind: entry.kind,
            period: entry.period,
            firing: entry.callback.is_none(),
        })
    }

    /// Ids of every registration, ascending.
    pub fn ids(&self) -> Vec<TimerId> {
        let mut ids: Vec<TimerId> = self.state.lock().entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// The bridge timers are armed on.
    #[must_use]
    pub fn bridge(&self) -> &Arc<dyn NativeTimerBridge> {
        &self.bridge
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::bridge::ManualTimerBridge;
    use crate::sink::{NativeEvents, native_channel};

    struct Fixture {
        registry: TimerRegistry,
        bridge: Arc<ManualTimerBridge>,
        events: NativeEvents,
    }

    fn fixture() -> Fixture {
        let (sink, events) = native_channel();
        let bridge = Arc::new(ManualTimerBridge::new(sink.clone()));
        let registry = TimerRegistry::new(bridge.clone(), sink);
        Fixture {
            registry,
            bridge,
            events,
        }
    }

    fn counter() -> (Arc<AtomicUsize>, TimerCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (
            count,
            Box::new(move || {
                inner.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    fn drain(events: &mut NativeEvents) -> Vec<TimerEvent> {
        std::iter::from_fn(|| events.try_next()).collect()
    }

    const fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_register_arms_native_timer() {
        let mut fx = fixture();
        let (_, cb) = counter();

        let id = fx.registry.register(cb, ms(100), TimerKind::Timeout).unwrap();

        assert_eq!(id, TimerId::FIRST);
        assert!(fx.bridge.is_armed(id));
        assert_eq!(drain(&mut fx.events), vec![TimerEvent::Started { id }]);
        assert_eq!(
            fx.registry.get(id),
            Some(RegistrationInfo {
                id,
                kind: TimerKind::Timeout,
                period: ms(100),
                firing: false
            })
        );
    }

    #[test]
    fn test_timeout_fire_invokes_once_and_removes() {
        let fx = fixture();
        let (count, cb) = counter();
        let id = fx.registry.register(cb, ms(10), TimerKind::Timeout).unwrap();

        assert_eq!(fx.registry.on_native_fire(id), FireOutcome::Completed);
        assert_eq!(fx.registry.on_native_fire(id), FireOutcome::Ignored);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!fx.registry.contains(id));
    }

    #[test]
    fn test_interval_fire_rearms_same_id() {
        let fx = fixture();
        let (count, cb) = counter();
        let id = fx.registry.register(cb, ms(50), TimerKind::Interval).unwrap();
        fx.bridge.fire_next_due(ms(50));

        assert_eq!(fx.registry.on_native_fire(id), FireOutcome::Rearmed);
        assert_eq!(fx.registry.on_native_fire(id), FireOutcome::Rearmed);

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(fx.registry.contains(id));
        assert!(fx.bridge.is_armed(id));
        assert_eq!(fx.registry.ids(), vec![id]);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let fx = fixture();
        let (_, cb) = counter();
        let id = fx
            .registry
            .register(cb, Duration::ZERO, TimerKind::Interval)
            .unwrap();

        assert_eq!(fx.registry.get(id).map(|r| r.period), Some(MIN_INTERVAL_PERIOD));
    }

    #[test]
    fn test_cancel_armed_timer_emits_single_cleared() {
        let mut fx = fixture();
        let (count, cb) = counter();
        let id = fx.registry.register(cb, ms(10), TimerKind::Timeout).unwrap();

        fx.registry.cancel(id).unwrap();

        assert!(!fx.bridge.is_armed(id));
        assert_eq!(fx.registry.on_native_fire(id), FireOutcome::Ignored);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(
            drain(&mut fx.events),
            vec![TimerEvent::Started { id }, TimerEvent::TimeoutCleared { id }]
        );
    }

    #[test]
    fn test_cancel_after_native_fire_in_flight() {
        let mut fx = fixture();
        let (count, cb) = counter();
        let id = fx.registry.register(cb, ms(10), TimerKind::Timeout).unwrap();

        // Native timer fired but the event has not been dispatched yet.
        fx.bridge.fire_next_due(ms(10));
        fx.registry.cancel(id).unwrap();
        assert_eq!(fx.registry.on_native_fire(id), FireOutcome::Ignored);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(
            drain(&mut fx.events),
            vec![
                TimerEvent::Started { id },
                TimerEvent::Timeout { id },
                TimerEvent::TimeoutCleared { id }
            ]
        );
    }

    #[test]
    fn test_cancel_unknown_id_reports_not_found() {
        let mut fx = fixture();
        let id = TimerId::new(99).unwrap();

        let err = fx.registry.cancel(id).unwrap_err();

        assert_eq!(err, Error::not_found(id));
        assert_eq!(
            drain(&mut fx.events),
            vec![TimerEvent::error("Timeout 99 is not found.")]
        );
    }

    #[test]
    fn test_cancel_after_completion_reports_not_found_every_time() {
        let fx = fixture();
        let (_, cb) = counter();
        let id = fx.registry.register(cb, ms(10), TimerKind::Timeout).unwrap();
        fx.registry.on_native_fire(id);

        assert!(fx.registry.cancel(id).is_err());
        assert!(fx.registry.cancel(id).is_err());
        assert!(fx.registry.is_empty());
    }

    #[test]
    fn test_interval_clearing_itself_is_not_rearmed() {
        let mut fx = fixture();
        let handle = fx.registry.clone();
        let own_id = Arc::new(Mutex::new(None::<TimerId>));
        let seen = Arc::clone(&own_id);

        let id = fx
            .registry
            .register(
                Box::new(move || {
                    if let Some(id) = *seen.lock() {
                        handle.cancel(id).unwrap();
                    }
                }),
                ms(20),
                TimerKind::Interval,
            )
            .unwrap();
        *own_id.lock() = Some(id);
        fx.bridge.fire_next_due(ms(20));
        let _ = drain(&mut fx.events);

        assert_eq!(fx.registry.on_native_fire(id), FireOutcome::ClearedDuringCallback);
        assert!(!fx.registry.contains(id));
        assert!(!fx.bridge.is_armed(id));
        assert_eq!(
            drain(&mut fx.events),
            vec![TimerEvent::TimeoutCleared { id }],
            "No re-arm after clear"
        );
    }

    #[test]
    fn test_callback_can_register_new_timer() {
        let fx = fixture();
        let handle = fx.registry.clone();
        let spawned = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&spawned);

        let id = fx
            .registry
            .register(
                Box::new(move || {
                    let (_, cb) = counter();
                    record
                        .lock()
                        .push(handle.register(cb, ms(5), TimerKind::Timeout).unwrap());
                }),
                ms(10),
                TimerKind::Timeout,
            )
            .unwrap();

        assert_eq!(fx.registry.on_native_fire(id), FireOutcome::Completed);
        let spawned = spawned.lock().clone();
        assert_eq!(spawned, vec![TimerId::new(2).unwrap()]);
        assert_eq!(fx.registry.ids(), spawned);
    }

    #[test]
    fn test_clear_all_disarms_everything() {
        let mut fx = fixture();
        let (_, a) = counter();
        let (_, b) = counter();
        let first = fx.registry.register(a, ms(10), TimerKind::Timeout).unwrap();
        let second = fx.registry.register(b, ms(10), TimerKind::Interval).unwrap();
        let _ = drain(&mut fx.events);

        assert_eq!(fx.registry.clear_all(), 2);
        assert!(fx.registry.is_empty());
        assert_eq!(fx.bridge.armed_count(), 0);

        let mut cleared: Vec<TimerEvent> = drain(&mut fx.events);
        cleared.sort_by_key(|e| e.timer_id());
        assert_eq!(
            cleared,
            vec![
                TimerEvent::TimeoutCleared { id: first },
                TimerEvent::TimeoutCleared { id: second }
            ]
        );
        assert_eq!(fx.registry.clear_all(), 0);
    }

    #[test]
    fn test_ids_are_not_reused_after_clear() {
        let fx = fixture();
        let (_, a) = counter();
        let (_, b) = counter();
        let first = fx.registry.register(a, ms(10), TimerKind::Timeout).unwrap();
        fx.registry.cancel(first).unwrap();

        let second = fx.registry.register(b, ms(10), TimerKind::Timeout).unwrap();
        assert!(second > first);
    }
}
