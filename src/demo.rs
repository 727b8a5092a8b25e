//! The demo run behind the `bgtimer` binary.
//!
//! Holds a background grant, registers one timeout and one interval, lets
//! them run, then clears the interval and releases the grant. Every
//! notification published along the way is collected in order.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bgtimer_core::{LifecycleModel, Result, ResultExt, TimerConfig};
use bgtimer_events::TimerEvent;
use bgtimer_timers::{BackgroundTimer, InProcessGrant, SimulatedTimer};
use tracing::info;

/// Timings for one demo run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoPlan {
    pub timeout: Duration,
    pub interval: Duration,
    pub run_for: Duration,
}

/// What happened during a demo run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    pub notifications: Vec<TimerEvent>,
    pub timeout_fires: usize,
    pub interval_fires: usize,
}

enum Driver {
    Simulated(SimulatedTimer),
    Realtime(BackgroundTimer<InProcessGrant>),
}

impl Driver {
    fn timer(&mut self) -> &mut BackgroundTimer<InProcessGrant> {
        match self {
            Self::Simulated(sim) => &mut **sim,
            Self::Realtime(timer) => timer,
        }
    }

    async fn run_for(&mut self, duration: Duration) {
        match self {
            Self::Simulated(sim) => {
                sim.advance(duration);
            }
            Self::Realtime(timer) => {
                timer.run_for(duration).await;
            }
        }
    }
}

fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    (count, move || {
        inner.fetch_add(1, Ordering::SeqCst);
    })
}

fn begin_background(timer: &mut BackgroundTimer<InProcessGrant>) -> Result<()> {
    match timer.lifecycle() {
        LifecycleModel::Explicit => timer.start_background_task(),
        LifecycleModel::Automatic => {
            timer.enable_background_execution()?;
            timer.on_entered_background()
        }
    }
}

fn end_background(timer: &mut BackgroundTimer<InProcessGrant>) -> Result<()> {
    match timer.lifecycle() {
        LifecycleModel::Explicit => timer.stop_background_task(),
        LifecycleModel::Automatic => {
            timer.on_entered_foreground()?;
            timer.disable_background_execution()
        }
    }
}

/// Run the demo.
///
/// With `simulate` the run uses a virtual clock and returns immediately;
/// otherwise it waits `plan.run_for` on the current tokio runtime.
///
/// # Errors
///
/// Returns the first refused operation: an invalid config, a grant that
/// cannot be acquired, or a timer that cannot be registered.
pub async fn run(config: TimerConfig, plan: DemoPlan, simulate: bool) -> Result<DemoReport> {
    let mut driver = if simulate {
        Driver::Simulated(SimulatedTimer::new(config)?)
    } else {
        Driver::Realtime(BackgroundTimer::tokio(config)?)
    };

    let mut notifications = driver.timer().subscribe();
    begin_background(driver.timer())?;

    let (timeouts, on_timeout) = counter();
    let (intervals, on_interval) = counter();
    let timer = driver.timer();
    let timeout_id = timer.set_timeout(on_timeout, plan.timeout)?;
    let interval_id = timer.set_interval(on_interval, plan.interval)?;
    info!(%timeout_id, %interval_id, run_ms = plan.run_for.as_millis(), "Demo timers registered");

    driver.run_for(plan.run_for).await;

    // A lapsed grant may already have torn the interval down.
    let timer = driver.timer();
    timer.clear_interval(interval_id).into_option_logged();
    end_background(timer)?;
    timer.pump();

    Ok(DemoReport {
        notifications: notifications.drain(),
        timeout_fires: timeouts.load(Ordering::SeqCst),
        interval_fires: intervals.load(Ordering::SeqCst),
    })
}
