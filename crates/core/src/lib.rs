//! Core types, errors, and configuration shared by every bgtimer crate.
//!
//! - **Types**: [`TimerId`], [`TimerKind`], [`BackgroundExecutionState`], [`TaskStatus`]
//! - **Errors**: [`Error`] with a copyable [`ErrorKind`] discriminant
//! - **Configuration**: [`TimerConfig`] and the [`LifecycleModel`] it selects

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use config::{LifecycleModel, TimerConfig};
pub use error::{Error, ErrorKind};
pub use result::{Result, ResultExt};
pub use types::{BackgroundExecutionState, TaskStatus, TimerId, TimerKind};
