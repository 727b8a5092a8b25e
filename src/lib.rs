#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # bgtimer
//!
//! Timeouts and intervals that keep firing while the application is in the
//! background.
//!
//! This library re-exports the workspace crates and hosts the demo that the
//! `bgtimer` binary runs.

pub use bgtimer_core;
pub use bgtimer_events;
pub use bgtimer_timers;

pub mod cli;
pub mod demo;
pub mod prelude;
