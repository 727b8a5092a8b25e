//! Deterministic harness on a virtual clock.
//!
//! `SimulatedTimer` is a [`BackgroundTimer`] whose native timers live on a
//! [`ManualTimerBridge`]. Advancing the clock fires due timers one by one and
//! applies each fire before looking for the next, so an interval re-armed by
//! a fire at `t` is due again at `t + period` within the same advance.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use bgtimer_core::{Result, TimerConfig};
use tracing::debug;

use crate::bridge::ManualTimerBridge;
use crate::guard::InProcessGrant;
use crate::sink::native_channel;
use crate::timer::BackgroundTimer;

/// Background timer driven by a manual clock.
pub struct SimulatedTimer {
    timer: BackgroundTimer<InProcessGrant>,
    bridge: Arc<ManualTimerBridge>,
}

impl SimulatedTimer {
    /// Create a simulated timer at virtual time zero.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` does not validate.
    pub fn new(config: TimerConfig) -> Result<Self> {
        let (sink, events) = native_channel();
        let bridge = Arc::new(ManualTimerBridge::new(sink.clone()));
        let timer =
            BackgroundTimer::from_parts(config, InProcessGrant::new(), bridge.clone(), sink, events)?;
        Ok(Self { timer, bridge })
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.bridge.now()
    }

    #[must_use]
    pub fn bridge(&self) -> &ManualTimerBridge {
        &self.bridge
    }

    /// Move the clock forward by `by`, firing and applying every timer due.
    ///
    /// Returns how many native fires happened.
    pub fn advance(&mut self, by: Duration) -> usize {
        let target = self.bridge.now().saturating_add(by);
        self.advance_to(target)
    }

    /// Move the clock forward to `target`. Never moves it backwards.
    ///
    /// Returns how many native fires happened.
    pub fn advance_to(&mut self, target: Duration) -> usize {
        self.timer.pump();

        let mut fires = 0_usize;
        while let Some(id) = self.bridge.fire_next_due(target) {
            debug!(timer_id = %id, now_ms = self.bridge.now().as_millis(), "Simulated fire");
            self.timer.pump();
            fires = fires.saturating_add(1);
        }
        self.bridge.set_now(target);
        fires
    }
}

impl Deref for SimulatedTimer {
    type Target = BackgroundTimer<InProcessGrant>;

    fn deref(&self) -> &Self::Target {
        &self.timer
    }
}

impl DerefMut for SimulatedTimer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.timer
    }
}
