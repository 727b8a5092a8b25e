//! Prelude module - common imports for bgtimer users
//!
//! ```ignore
//! use bgtimer::prelude::*;
//! ```

pub use bgtimer_core::{
    BackgroundExecutionState, Error, ErrorKind, LifecycleModel, Result, ResultExt, TimerConfig,
    TimerId, TimerKind,
};
pub use bgtimer_events::{EventPattern, EventSubscription, TimerEvent};
pub use bgtimer_timers::{BackgroundGrant, BackgroundTimer, InProcessGrant, SimulatedTimer};
