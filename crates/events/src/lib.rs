//! Timer events and the application notification stream.
//!
//! - **Event vocabulary**: [`TimerEvent`] with stable names and JSON payloads,
//!   shared by the native layer and the application
//! - **Event bus**: synchronous publish, async or polled receive, pattern
//!   subscriptions guarded by a circuit breaker
//!
//! # Example
//!
//! ```ignore
//! use bgtimer_events::{EventBus, EventPattern, TimerEvent};
//!
//! let bus = EventBus::new();
//! let (_, mut errors) = bus.subscribe_with_pattern(EventPattern::ByName(
//!     bgtimer_events::event::ERROR.to_string(),
//! ));
//! bus.publish(&TimerEvent::error("Background task is not running"));
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bus;
pub mod error;
pub mod event;

pub use bus::{CircuitBreaker, EventBus, EventBusBuilder, EventPattern, EventSubscription};
pub use error::{Error, Result};
pub use event::{NamedEvent, TimerEvent};
