//! Native timer bridges.
//!
//! A bridge only knows "fire once after a delay". It never tracks
//! repetition: the registry re-arms intervals itself after every fire.
//!
//! Every bridge reports through an [`EventSink`](crate::sink::EventSink):
//! - `Started { id }` when a timer is armed
//! - `Timeout { id }` when it fires
//! - `TimeoutCleared { id }` when an armed timer is disarmed
//!
//! Arming an id that is already armed replaces the previous native timer,
//! so at most one native timer is live per id.

mod manual;
mod realtime;

use std::time::Duration;

use bgtimer_core::TimerId;

pub use manual::ManualTimerBridge;
pub use realtime::TokioTimerBridge;

/// One-shot timer facility provided by the platform.
pub trait NativeTimerBridge: Send + Sync {
    /// Arm a one-shot timer for `id`, replacing any armed timer for it.
    fn arm(&self, id: TimerId, delay: Duration);

    /// Cancel the armed timer for `id`.
    ///
    /// Returns `false` if nothing was armed (never armed, already fired).
    fn disarm(&self, id: TimerId) -> bool;

    /// Check if a timer is armed for `id`.
    fn is_armed(&self, id: TimerId) -> bool;

    /// Number of armed timers.
    fn armed_count(&self) -> usize;
}
