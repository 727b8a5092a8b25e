//! Background timers that keep firing while the application is backgrounded.
//!
//! - **Identifier allocation**: [`IdAllocator`]
//! - **Replay protocol**: [`TimerRegistry`] invokes timeouts once and re-arms
//!   intervals under the same id
//! - **Native bridges**: [`NativeTimerBridge`] with a tokio adapter and a
//!   manual-clock adapter
//! - **Background execution**: [`BackgroundGuard`] over a [`BackgroundGrant`]
//! - **Event relay**: [`EventRelay`] applies native events and republishes them
//! - **Facade**: [`BackgroundTimer`], and [`SimulatedTimer`] for virtual time
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use bgtimer_core::TimerConfig;
//! use bgtimer_timers::SimulatedTimer;
//!
//! let mut sim = SimulatedTimer::new(TimerConfig::new())?;
//! let id = sim.set_interval(|| println!("tick"), Duration::from_millis(50))?;
//! sim.advance(Duration::from_millis(120));
//! sim.clear_interval(id)?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod allocator;
pub mod bridge;
pub mod guard;
pub mod registry;
pub mod relay;
pub mod simulation;
pub mod sink;
pub mod timer;

pub use allocator::IdAllocator;
pub use bridge::{ManualTimerBridge, NativeTimerBridge, TokioTimerBridge};
pub use guard::{BackgroundGrant, BackgroundGuard, InProcessGrant};
pub use registry::{FireOutcome, RegistrationInfo, TimerCallback, TimerRegistry};
pub use relay::{ErrorListener, EventRelay};
pub use simulation::SimulatedTimer;
pub use sink::{EventSink, NativeEvents, native_channel};
pub use timer::{BackgroundTimer, duration_from_ms};
