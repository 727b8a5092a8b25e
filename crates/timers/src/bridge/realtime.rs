//! Wall-clock bridge backed by tokio timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bgtimer_core::{Error, Result, TimerId};
use bgtimer_events::TimerEvent;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::debug;

use super::NativeTimerBridge;
use crate::sink::EventSink;

/// Armed timers: id -> (generation, task).
type ArmedTimers = Arc<Mutex<HashMap<TimerId, (u64, AbortHandle)>>>;

/// Native timer bridge that spawns one sleeping task per armed id.
///
/// Fires are posted to the sink from the timer task; the registry owner
/// picks them up when it drains the queue. A generation number tags each
/// arm so that a task belonging to a replaced timer never reports a fire.
pub struct TokioTimerBridge {
    sink: EventSink,
    runtime: Handle,
    armed: ArmedTimers,
    generation: AtomicU64,
}

impl TokioTimerBridge {
    /// Create a bridge that spawns onto `runtime`.
    #[must_use]
    pub fn new(sink: EventSink, runtime: Handle) -> Self {
        Self {
            sink,
            runtime,
            armed: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Create a bridge on the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeUnavailable` outside a tokio runtime.
    pub fn current(sink: EventSink) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| Error::runtime_unavailable(e.to_string()))?;
        Ok(Self::new(sink, runtime))
    }
}

impl NativeTimerBridge for TokioTimerBridge {
    fn arm(&self, id: TimerId, delay: Duration) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        self.sink.emit(TimerEvent::Started { id });

        let sink = self.sink.clone();
        let armed = Arc::clone(&self.armed);

        // The map lock is held across spawn so the task cannot look itself up
        // before it is registered.
        let mut timers = self.armed.lock();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let still_current = {
                let mut timers = armed.lock();
                match timers.get(&id) {
                    Some((current, _)) if *current == generation => {
                        timers.remove(&id);
                        true
                    }
                    _ => false,
                }
            };

            if still_current {
                debug!(timer_id = %id, "Native timer fired");
                sink.emit(TimerEvent::Timeout { id });
            }
        });

        if let Some((_, previous)) = timers.insert(id, (generation, task.abort_handle())) {
            previous.abort();
        }
    }

    fn disarm(&self, id: TimerId) -> bool {
        let removed = self.armed.lock().remove(&id);
        match removed {
            Some((_, task)) => {
                task.abort();
                self.sink.emit(TimerEvent::TimeoutCleared { id });
                true
            }
            None => false,
        }
    }

    fn is_armed(&self, id: TimerId) -> bool {
        self.armed.lock().contains_key(&id)
    }

    fn armed_count(&self) -> usize {
        self.armed.lock().len()
    }
}

impl Drop for TokioTimerBridge {
    fn drop(&mut self) {
        for (_, (_, task)) in self.armed.lock().drain() {
            task.abort();
        }
    }
}
