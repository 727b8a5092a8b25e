//! Bridge driven by a virtual clock.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use bgtimer_core::TimerId;
use bgtimer_events::TimerEvent;
use parking_lot::Mutex;
use tracing::debug;

use super::NativeTimerBridge;
use crate::sink::EventSink;

/// Min-heap entry: (deadline, arm sequence, id).
type Deadline = Reverse<(Duration, u64, TimerId)>;

#[derive(Default)]
struct ManualState {
    now: Duration,
    seq: u64,
    queue: BinaryHeap<Deadline>,
    /// Armed ids and the sequence of their live heap entry.
    armed: HashMap<TimerId, u64>,
}

/// Native timer bridge whose clock only moves when told to.
///
/// Deadlines fire in (deadline, arm order) order. Heap entries belonging to
/// disarmed or replaced timers are skipped when they surface.
pub struct ManualTimerBridge {
    sink: EventSink,
    state: Mutex<ManualState>,
}

impl ManualTimerBridge {
    /// Create a bridge at virtual time zero.
    #[must_use]
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink,
            state: Mutex::new(ManualState::default()),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Move the clock forward to `to`. Never moves backwards.
    pub fn set_now(&self, to: Duration) {
        let mut state = self.state.lock();
        state.now = state.now.max(to);
    }

    /// Deadline of the armed timer for `id`.
    pub fn deadline_of(&self, id: TimerId) -> Option<Duration> {
        let state = self.state.lock();
        let seq = *state.armed.get(&id)?;
        state
            .queue
            .iter()
            .find(|Reverse((_, s, i))| *s == seq && *i == id)
            .map(|Reverse((deadline, _, _))| *deadline)
    }

    /// Earliest live deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        let state = self.state.lock();
        state
            .queue
            .iter()
            .filter(|Reverse((_, seq, id))| state.armed.get(id) == Some(seq))
            .map(|Reverse((deadline, _, _))| *deadline)
            .min()
    }

    /// Fire the earliest timer due at or before `until`.
    ///
    /// Moves the clock to that timer's deadline and emits `Timeout`.
    pub fn fire_next_due(&self, until: Duration) -> Option<TimerId> {
        let mut state = self.state.lock();
        loop {
            let Reverse((deadline, seq, id)) = *state.queue.peek()?;
            if deadline > until {
                return None;
            }
            state.queue.pop();

            if state.armed.get(&id) != Some(&seq) {
                continue;
            }

            state.armed.remove(&id);
            state.now = state.now.max(deadline);
            debug!(timer_id = %id, at_ms = deadline.as_millis(), "Manual timer fired");
            self.sink.emit(TimerEvent::Timeout { id });
            return Some(id);
        }
    }
}

impl NativeTimerBridge for ManualTimerBridge {
    fn arm(&self, id: TimerId, delay: Duration) {
        let mut state = self.state.lock();
        state.seq = state.seq.saturating_add(1);
        let seq = state.seq;
        let deadline = state.now.checked_add(delay).unwrap_or(Duration::MAX);

        state.armed.insert(id, seq);
        state.queue.push(Reverse((deadline, seq, id)));
        self.sink.emit(TimerEvent::Started { id });
    }

    fn disarm(&self, id: TimerId) -> bool {
        let removed = self.state.lock().armed.remove(&id).is_some();
        if removed {
            self.sink.emit(TimerEvent::TimeoutCleared { id });
        }
        removed
    }

    fn is_armed(&self, id: TimerId) -> bool {
        self.state.lock().armed.contains_key(&id)
    }

    fn armed_count(&self) -> usize {
        self.state.lock().armed.len()
    }
}
