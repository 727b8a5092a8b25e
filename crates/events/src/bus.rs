//! Event bus for application notifications.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bgtimer_core::TimerId;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::TimerEvent;

const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
const DEFAULT_PATTERN_CAPACITY: usize = 100;
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Circuit breaker to stop delivering to subscribers that went away.
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    threshold: u32,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given failure threshold.
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            threshold,
        }
    }

    /// Check if a delivery should be attempted.
    pub fn allow_request(&self) -> bool {
        self.failure_count.load(Ordering::Relaxed) < self.threshold
    }

    /// Record a successful delivery.
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }

    /// Record a failed delivery.
    pub fn record_failure(&self) {
        let _ = self
            .failure_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_add(1))
            });
    }

    /// Get the current failure count.
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Reset the circuit breaker.
    pub fn reset(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }
}

struct Subscriber {
    sender: broadcast::Sender<TimerEvent>,
    pattern: EventPattern,
    breaker: Arc<CircuitBreaker>,
}

/// Subscription handle for receiving events.
pub struct EventSubscription {
    receiver: broadcast::Receiver<TimerEvent>,
}

impl EventSubscription {
    /// Receive the next event.
    ///
    /// # Errors
    ///
    /// Returns `Lagged` if events were dropped for this receiver and
    /// `ChannelClosed` once the bus is gone.
    pub async fn recv(&mut self) -> Result<TimerEvent> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Lagged(skipped) => Error::Lagged { skipped },
            broadcast::error::RecvError::Closed => Error::ChannelClosed,
        })
    }

    /// Try to receive an event without waiting.
    ///
    /// # Errors
    ///
    /// Returns `Empty` if nothing is queued, `ChannelClosed` once the bus is
    /// gone, and `Lagged` if events were dropped.
    pub fn try_recv(&mut self) -> Result<TimerEvent> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Lagged(skipped) => Error::Lagged { skipped },
            broadcast::error::TryRecvError::Empty => Error::Empty,
            broadcast::error::TryRecvError::Closed => Error::ChannelClosed,
        })
    }

    /// Collect every event queued right now.
    pub fn drain(&mut self) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Subscriber lagged while draining");
                }
                Err(_) => break,
            }
        }
        events
    }
}

/// Pattern for filtering events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPattern {
    /// Match all events.
    All,
    /// Match events by name.
    ByName(String),
    /// Match events by any of several names.
    ByNames(Vec<String>),
    /// Match events concerning one timer.
    ByTimer(TimerId),
}

impl EventPattern {
    /// Check if an event matches this pattern.
    pub fn matches(&self, event: &TimerEvent) -> bool {
        match self {
            Self::All => true,
            Self::ByName(name) => event.name() == name,
            Self::ByNames(names) => names.iter().any(|n| event.name() == n),
            Self::ByTimer(id) => event.timer_id() == Some(*id),
        }
    }
}

/// Event bus for publishing and subscribing to timer notifications.
pub struct EventBus {
    /// Broadcast sender for all events.
    broadcast: broadcast::Sender<TimerEvent>,
    /// Pattern-based subscribers.
    subscribers: RwLock<HashMap<String, Subscriber>>,
    /// Next subscriber ID.
    next_id: AtomicU64,
    /// Capacity of per-pattern channels.
    pattern_capacity: usize,
    /// Failure threshold for circuit breakers.
    failure_threshold: u32,
}

impl EventBus {
    /// Create a new event bus with default capacities.
    #[must_use]
    pub fn new() -> Self {
        EventBusBuilder::new().build()
    }

    /// Publish an event.
    ///
    /// Returns the number of receivers the event reached.
    pub fn publish(&self, event: &TimerEvent) -> usize {
        debug!(event = event.name(), timer_id = ?event.timer_id(), "Publishing event");

        let mut delivered = self.broadcast.send(event.clone()).unwrap_or(0);

        let mut tripped = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (sub_id, sub) in subscribers.iter().filter(|(_, sub)| sub.pattern.matches(event)) {
                match sub.sender.send(event.clone()) {
                    Ok(count) => {
                        sub.breaker.record_success();
                        delivered = delivered.saturating_add(count);
                    }
                    Err(broadcast::error::SendError(_)) => {
                        sub.breaker.record_failure();
                        debug!(
                            subscriber = %sub_id,
                            event = event.name(),
                            subscriber_failures = sub.breaker.failure_count(),
                            "Failed to deliver event to subscriber"
                        );
                        if !sub.breaker.allow_request() {
                            tripped.push(sub_id.clone());
                        }
                    }
                }
            }
        }

        if !tripped.is_empty() {
            let mut subscribers = self.subscribers.write();
            for sub_id in &tripped {
                subscribers.remove(sub_id);
                debug!(subscriber = %sub_id, "Circuit breaker open, subscriber removed");
            }
        }

        delivered
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.broadcast.subscribe(),
        }
    }

    /// Subscribe to events matching a pattern.
    pub fn subscribe_with_pattern(&self, pattern: EventPattern) -> (String, EventSubscription) {
        let (sender, receiver) = broadcast::channel(self.pattern_capacity);
        let id = format!("sub_{}", self.next_id.fetch_add(1, Ordering::Relaxed));

        self.subscribers.write().insert(
            id.clone(),
            Subscriber {
                sender,
                pattern,
                breaker: Arc::new(CircuitBreaker::new(self.failure_threshold)),
            },
        );

        (id, EventSubscription { receiver })
    }

    /// Unsubscribe a pattern-based subscriber.
    ///
    /// Returns `true` if the subscriber existed.
    pub fn unsubscribe(&self, subscriber_id: &str) -> bool {
        self.subscribers.write().remove(subscriber_id).is_some()
    }

    /// Number of pattern-based subscribers.
    pub fn pattern_subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Get the circuit breaker failure threshold.
    #[must_use]
    pub const fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `EventBus`.
pub struct EventBusBuilder {
    channel_capacity: usize,
    pattern_capacity: usize,
    failure_threshold: u32,
}

impl EventBusBuilder {
    /// Create a new builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            pattern_capacity: DEFAULT_PATTERN_CAPACITY,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    /// Set the broadcast channel capacity. Zero is raised to one.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the per-pattern channel capacity. Zero is raised to one.
    #[must_use]
    pub fn with_pattern_capacity(mut self, capacity: usize) -> Self {
        self.pattern_capacity = capacity.max(1);
        self
    }

    /// Set the circuit breaker failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Build the event bus.
    #[must_use]
    pub fn build(self) -> EventBus {
        let (broadcast, _) = broadcast::channel(self.channel_capacity);

        EventBus {
            broadcast,
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            pattern_capacity: self.pattern_capacity,
            failure_threshold: self.failure_threshold,
        }
    }
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event;

    fn id(raw: u64) -> TimerId {
        TimerId::new(raw).unwrap()
    }

    // ==========================================================================
    // EventPattern BEHAVIORAL TESTS
    // ==========================================================================

    #[test]
    fn should_match_all_events_with_all_pattern() {
        assert!(EventPattern::All.matches(&TimerEvent::TaskStarted));
        assert!(EventPattern::All.matches(&TimerEvent::error("boom")));
    }

    #[test]
    fn should_match_event_by_exact_name() {
        let event = TimerEvent::Timeout { id: id(1) };

        assert!(
            EventPattern::ByName(event::TIMEOUT.to_string()).matches(&event),
            "ByName should match correct event name"
        );
        assert!(
            !EventPattern::ByName(event::TIMEOUT_CLEARED.to_string()).matches(&event),
            "ByName should not match wrong event name"
        );
    }

    #[test]
    fn should_match_event_by_timer_id() {
        let event = TimerEvent::TimeoutCleared { id: id(3) };

        assert!(EventPattern::ByTimer(id(3)).matches(&event));
        assert!(!EventPattern::ByTimer(id(4)).matches(&event));
        assert!(
            !EventPattern::ByTimer(id(3)).matches(&TimerEvent::TaskStopped),
            "Events without a timer never match ByTimer"
        );
    }

    #[test]
    fn should_match_event_by_multiple_names() {
        let pattern = EventPattern::ByNames(vec![
            event::TASK_STARTED.to_string(),
            event::TASK_STOPPED.to_string(),
        ]);

        assert!(pattern.matches(&TimerEvent::TaskStopped));
        assert!(!pattern.matches(&TimerEvent::Started { id: id(1) }));
    }

    // ==========================================================================
    // EventBus BEHAVIORAL TESTS
    // ==========================================================================

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        let delivered = bus.publish(&TimerEvent::Timeout { id: id(1) });
        assert_eq!(delivered, 1);

        let received = sub.recv().await.unwrap();
        assert_eq!(received, TimerEvent::Timeout { id: id(1) });
    }

    #[test]
    fn test_publish_without_subscribers_reaches_nobody() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(&TimerEvent::TaskStarted), 0);
    }

    #[tokio::test]
    async fn should_deliver_events_only_to_matching_pattern_subscribers() {
        let bus = EventBus::new();
        let (_, mut errors) =
            bus.subscribe_with_pattern(EventPattern::ByName(event::ERROR.to_string()));

        bus.publish(&TimerEvent::Started { id: id(1) });
        bus.publish(&TimerEvent::error("Timeout 9 is not found."));

        let received = errors.recv().await.unwrap();
        assert!(received.is_error());
        assert_eq!(
            errors.try_recv(),
            Err(Error::Empty),
            "Only the error should be delivered"
        );
    }

    #[test]
    fn should_assign_unique_subscriber_ids() {
        let bus = EventBus::new();
        let (first, _a) = bus.subscribe_with_pattern(EventPattern::All);
        let (second, _b) = bus.subscribe_with_pattern(EventPattern::All);

        assert_ne!(first, second);
        assert_eq!(bus.pattern_subscriber_count(), 2);
    }

    #[test]
    fn should_remove_subscriber_on_unsubscribe() {
        let bus = EventBus::new();
        let (sub_id, _sub) = bus.subscribe_with_pattern(EventPattern::All);

        assert!(bus.unsubscribe(&sub_id));
        assert!(!bus.unsubscribe(&sub_id));
        assert_eq!(bus.pattern_subscriber_count(), 0);
    }

    #[test]
    fn test_drain_collects_in_publish_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        bus.publish(&TimerEvent::Started { id: id(1) });
        bus.publish(&TimerEvent::Timeout { id: id(1) });

        assert_eq!(
            sub.drain(),
            vec![
                TimerEvent::Started { id: id(1) },
                TimerEvent::Timeout { id: id(1) }
            ]
        );
    }

    // ==========================================================================
    // CircuitBreaker TESTS
    // ==========================================================================

    #[test]
    fn test_circuit_breaker_initial_state() {
        let breaker = CircuitBreaker::new(3);
        assert!(breaker.allow_request());
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_circuit_breaker_opens_at_threshold() {
        let breaker = CircuitBreaker::new(2);
        breaker.record_failure();
        assert!(breaker.allow_request());
        breaker.record_failure();
        assert!(!breaker.allow_request());

        breaker.reset();
        assert!(breaker.allow_request());
    }

    #[test]
    fn test_circuit_breaker_removes_dropped_subscriber() {
        let bus = EventBusBuilder::new().with_failure_threshold(2).build();
        let (_, sub) = bus.subscribe_with_pattern(EventPattern::All);
        let (_, _live) = bus.subscribe_with_pattern(EventPattern::All);
        drop(sub);

        bus.publish(&TimerEvent::TaskStarted);
        assert_eq!(bus.pattern_subscriber_count(), 2, "Breaker still closed");

        bus.publish(&TimerEvent::TaskStarted);
        assert_eq!(bus.pattern_subscriber_count(), 1, "Open breaker drops the entry");

        for _ in 0..5 {
            bus.publish(&TimerEvent::TaskStarted);
        }
        assert_eq!(bus.pattern_subscriber_count(), 1);
    }

    #[test]
    fn test_try_recv_distinguishes_empty_from_closed() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        assert_eq!(sub.try_recv(), Err(Error::Empty));

        drop(bus);
        assert_eq!(sub.try_recv(), Err(Error::ChannelClosed));
    }

    #[test]
    fn test_builder_clamps_zero_capacity() {
        let bus = EventBusBuilder::new()
            .with_channel_capacity(0)
            .with_pattern_capacity(0)
            .build();
        let mut sub = bus.subscribe();
        bus.publish(&TimerEvent::TaskStopped);
        assert_eq!(sub.try_recv().unwrap(), TimerEvent::TaskStopped);
    }
}
