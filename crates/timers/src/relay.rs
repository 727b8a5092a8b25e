//! Event relay.
//!
//! The single consumer of the native event queue. Each event is applied to
//! the registry first and then published to the application's event bus:
//!
//! | event            | action                                  |
//! |------------------|-----------------------------------------|
//! | `Timeout`        | `TimerRegistry::on_native_fire`         |
//! | `TimeoutCleared` | none, the registry already removed it   |
//! | `Started`        | none                                    |
//! | `TaskStarted`    | mark the guard held                     |
//! | `TaskStopped`    | mark the guard released, `clear_all`    |
//! | `Error`          | hand the message to the error listener  |
//!
//! A `Timeout` whose registration is already gone is not published, so
//! subscribers never see a fire for a callback that did not run.
//!
//! Events are handled one at a time in the order they were queued.

use std::future::Future;
use std::sync::Arc;

use bgtimer_events::{EventBus, TimerEvent};
use tracing::{debug, info, warn};

use crate::registry::{FireOutcome, TimerRegistry};
use crate::sink::NativeEvents;

/// Application callback for error notifications.
pub type ErrorListener = Box<dyn FnMut(&str) + Send + 'static>;

/// Drains native events into the registry and the event bus.
pub struct EventRelay {
    events: NativeEvents,
    registry: TimerRegistry,
    bus: Arc<EventBus>,
    guard_held: bool,
    on_error: Option<ErrorListener>,
}

impl EventRelay {
    #[must_use]
    pub fn new(events: NativeEvents, registry: TimerRegistry, bus: Arc<EventBus>) -> Self {
        Self {
            events,
            registry,
            bus,
            guard_held: false,
            on_error: None,
        }
    }

    /// Install the error listener, replacing any previous one.
    pub fn on_error(&mut self, listener: impl FnMut(&str) + Send + 'static) {
        self.on_error = Some(Box::new(listener));
    }

    /// Whether the last guard notification was `TaskStarted`.
    #[must_use]
    pub const fn is_guard_held(&self) -> bool {
        self.guard_held
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Number of native events waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Apply one event and publish it.
    pub fn dispatch(&mut self, event: TimerEvent) {
        match &event {
            TimerEvent::Timeout { id } => {
                if self.registry.on_native_fire(*id) == FireOutcome::Ignored {
                    debug!(timer_id = %id, "Fire for unregistered timer suppressed");
                    return;
                }
            }
            TimerEvent::Started { .. } | TimerEvent::TimeoutCleared { .. } => {}
            TimerEvent::TaskStarted => {
                self.guard_held = true;
            }
            TimerEvent::TaskStopped => {
                self.guard_held = false;
                let cleared = self.registry.clear_all();
                if cleared > 0 {
                    info!(cleared, "Background task stopped, timers torn down");
                }
            }
            TimerEvent::Error { message } => {
                warn!(%message, "Background timer error");
                if let Some(listener) = self.on_error.as_mut() {
                    listener(message);
                }
            }
        }

        let delivered = self.bus.publish(&event);
        debug!(event = event.name(), delivered, "Event relayed");
    }

    /// Dispatch every queued event, including those queued while dispatching.
    ///
    /// Returns how many events were dispatched.
    pub fn drain(&mut self) -> usize {
        let mut dispatched = 0_usize;
        while let Some(event) = self.events.try_next() {
            self.dispatch(event);
            dispatched = dispatched.saturating_add(1);
        }
        dispatched
    }

    /// Wait for one event and dispatch it.
    ///
    /// Returns `None` once every sink is gone.
    pub async fn next_event(&mut self) -> Option<TimerEvent> {
        let event = self.events.next().await?;
        self.dispatch(event.clone());
        Some(event)
    }

    /// Dispatch events as they arrive until `shutdown` completes.
    ///
    /// Returns how many events were dispatched.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> usize {
        tokio::pin!(shutdown);
        let mut dispatched = 0_usize;
        loop {
            let next = tokio::select! {
                biased;
                () = &mut shutdown => None,
                event = self.events.next() => event,
            };
            let Some(event) = next else {
                break;
            };
            self.dispatch(event);
            dispatched = dispatched.saturating_add(1);
        }
        dispatched
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bgtimer_core::{TimerId, TimerKind};
    use parking_lot::Mutex;

    use super::*;
    use crate::bridge::{ManualTimerBridge, NativeTimerBridge};
    use crate::sink::{EventSink, native_channel};

    struct Fixture {
        relay: EventRelay,
        registry: TimerRegistry,
        bridge: Arc<ManualTimerBridge>,
        sink: EventSink,
    }

    fn fixture() -> Fixture {
        let (sink, events) = native_channel();
        let bridge = Arc::new(ManualTimerBridge::new(sink.clone()));
        let registry = TimerRegistry::new(bridge.clone(), sink.clone());
        let relay = EventRelay::new(events, registry.clone(), Arc::new(EventBus::new()));
        Fixture {
            relay,
            registry,
            bridge,
            sink,
        }
    }

    fn counting() -> (Arc<AtomicUsize>, Box<dyn FnMut() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (
            count,
            Box::new(move || {
                inner.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_timeout_event_invokes_callback() {
        let mut fx = fixture();
        let mut sub = fx.relay.bus().subscribe();
        let (count, cb) = counting();
        let id = fx
            .registry
            .register(cb, Duration::from_millis(10), TimerKind::Timeout)
            .unwrap();

        fx.bridge.fire_next_due(Duration::from_millis(10));
        assert_eq!(fx.relay.drain(), 2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!fx.registry.contains(id));
        assert_eq!(
            sub.drain(),
            vec![TimerEvent::Started { id }, TimerEvent::Timeout { id }]
        );
    }

    #[test]
    fn test_task_stopped_clears_registry() {
        let mut fx = fixture();
        let (_, a) = counting();
        let (_, b) = counting();
        fx.registry
            .register(a, Duration::from_millis(10), TimerKind::Timeout)
            .unwrap();
        fx.registry
            .register(b, Duration::from_millis(10), TimerKind::Interval)
            .unwrap();
        fx.sink.emit(TimerEvent::TaskStarted);
        fx.relay.drain();
        assert!(fx.relay.is_guard_held());

        fx.sink.emit(TimerEvent::TaskStopped);
        fx.relay.drain();

        assert!(!fx.relay.is_guard_held());
        assert!(fx.registry.is_empty());
        assert_eq!(fx.bridge.armed_count(), 0);
    }

    #[test]
    fn test_error_reaches_listener() {
        let mut fx = fixture();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        fx.relay
            .on_error(move |message| record.lock().push(message.to_string()));

        let _ = fx.registry.cancel(TimerId::new(7).unwrap());
        fx.relay.drain();

        assert_eq!(*seen.lock(), vec!["Timeout 7 is not found.".to_string()]);
    }

    #[test]
    fn test_fire_after_clear_is_ignored() {
        let mut fx = fixture();
        let mut sub = fx.relay.bus().subscribe();
        let (count, cb) = counting();
        let id = fx
            .registry
            .register(cb, Duration::from_millis(10), TimerKind::Timeout)
            .unwrap();
        fx.bridge.fire_next_due(Duration::from_millis(10));
        fx.registry.cancel(id).unwrap();

        assert_eq!(fx.relay.drain(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(
            sub.drain(),
            vec![TimerEvent::Started { id }, TimerEvent::TimeoutCleared { id }],
            "A fire whose callback never ran is not published"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_dispatches_until_shutdown() {
        let mut fx = fixture();
        fx.sink.emit(TimerEvent::TaskStarted);
        fx.sink.emit(TimerEvent::TaskStopped);

        let dispatched = fx
            .relay
            .run_until(tokio::time::sleep(Duration::from_secs(1)))
            .await;

        assert_eq!(dispatched, 2);
        assert!(!fx.relay.is_guard_held());
    }

    #[tokio::test]
    async fn test_run_until_prefers_shutdown() {
        let mut fx = fixture();
        fx.sink.emit(TimerEvent::TaskStarted);

        assert_eq!(fx.relay.run_until(std::future::ready(())).await, 0);
        assert_eq!(fx.relay.pending(), 1);
    }

    #[tokio::test]
    async fn test_next_event_returns_dispatched_event() {
        let mut fx = fixture();
        fx.sink.emit(TimerEvent::TaskStarted);

        assert_eq!(fx.relay.next_event().await, Some(TimerEvent::TaskStarted));
        assert!(fx.relay.is_guard_held());
    }
}
