//! The queue native collaborators post events into.
//!
//! Adapters may raise events from any thread or timer facility; the owner of
//! the registry drains the queue on its own context, so registry mutation
//! never races with native callbacks.

use bgtimer_events::TimerEvent;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Sending half of the native event queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TimerEvent>,
}

impl EventSink {
    /// Post an event to the owner.
    ///
    /// Returns `false` if the owner is gone.
    pub fn emit(&self, event: TimerEvent) -> bool {
        trace!(event = event.name(), timer_id = ?event.timer_id(), "Native event queued");
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                warn!(event = event.name(), "Native event dropped, owner is gone");
                false
            }
        }
    }

    /// Check if the owner is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of the native event queue.
#[derive(Debug)]
pub struct NativeEvents {
    rx: mpsc::UnboundedReceiver<TimerEvent>,
}

impl NativeEvents {
    /// Take the next queued event without waiting.
    pub fn try_next(&mut self) -> Option<TimerEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event. Returns `None` once every sink is dropped.
    pub async fn next(&mut self) -> Option<TimerEvent> {
        self.rx.recv().await
    }

    /// Number of events waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create a connected sink and queue.
#[must_use]
pub fn native_channel() -> (EventSink, NativeEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, NativeEvents { rx })
}
