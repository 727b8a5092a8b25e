//! Timer event vocabulary.
//!
//! The native layer and the application notification stream share one set of
//! named events. Each event has a stable name and a small JSON payload.

use bgtimer_core::{TaskStatus, TimerId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};

/// Event name: the background grant was acquired.
pub const TASK_STARTED: &str = "backgroundTimer.taskStarted";
/// Event name: the background grant was released.
pub const TASK_STOPPED: &str = "backgroundTimer.taskStopped";
/// Event name: a native one-shot timer was armed.
pub const STARTED: &str = "backgroundTimer.started";
/// Event name: a native one-shot timer fired.
pub const TIMEOUT: &str = "backgroundTimer.timeout";
/// Event name: a native one-shot timer was cancelled.
pub const TIMEOUT_CLEARED: &str = "backgroundTimer.timeoutCleared";
/// Event name: an advisory error.
pub const ERROR: &str = "backgroundTimer.error";

/// Every event name, in declaration order.
pub const ALL_NAMES: [&str; 6] = [
    TASK_STARTED,
    TASK_STOPPED,
    STARTED,
    TIMEOUT,
    TIMEOUT_CLEARED,
    ERROR,
];

/// Events raised by the native layer and surfaced to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerEvent {
    /// Background execution grant acquired.
    TaskStarted,
    /// Background execution grant released or lapsed.
    TaskStopped,
    /// A one-shot native timer was armed for `id`.
    Started { id: TimerId },
    /// The native timer for `id` fired.
    Timeout { id: TimerId },
    /// The native timer for `id` was cancelled.
    TimeoutCleared { id: TimerId },
    /// Advisory error with a human-readable message.
    Error { message: String },
}

/// A named event as carried over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedEvent {
    pub name: String,
    pub payload: Value,
}

#[derive(Deserialize)]
struct IdPayload {
    id: TimerId,
}

#[derive(Deserialize)]
struct MessagePayload {
    message: String,
}

impl TimerEvent {
    /// Create an error event from anything displayable.
    pub fn error(message: impl ToString) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }

    /// The stable event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TaskStarted => TASK_STARTED,
            Self::TaskStopped => TASK_STOPPED,
            Self::Started { .. } => STARTED,
            Self::Timeout { .. } => TIMEOUT,
            Self::TimeoutCleared { .. } => TIMEOUT_CLEARED,
            Self::Error { .. } => ERROR,
        }
    }

    /// The timer this event concerns, if any.
    #[must_use]
    pub const fn timer_id(&self) -> Option<TimerId> {
        match self {
            Self::Started { id } | Self::Timeout { id } | Self::TimeoutCleared { id } => Some(*id),
            Self::TaskStarted | Self::TaskStopped | Self::Error { .. } => None,
        }
    }

    /// Check if this is an error event.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The JSON payload carried with the event name.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::TaskStarted => json!({ "status": TaskStatus::Running }),
            Self::TaskStopped => json!({ "status": TaskStatus::Stopped }),
            Self::Started { id } | Self::Timeout { id } | Self::TimeoutCleared { id } => {
                json!({ "id": id })
            }
            Self::Error { message } => json!({ "message": message }),
        }
    }

    /// Convert into the named wire form.
    #[must_use]
    pub fn to_named(&self) -> NamedEvent {
        NamedEvent {
            name: self.name().to_string(),
            payload: self.payload(),
        }
    }

    /// Parse a named event.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEvent` for an unrecognized name and `InvalidPayload`
    /// when the payload does not match the name.
    pub fn from_named(name: &str, payload: Value) -> Result<Self> {
        let invalid = |e: serde_json::Error| Error::invalid_payload(name, e.to_string());
        match name {
            TASK_STARTED => Ok(Self::TaskStarted),
            TASK_STOPPED => Ok(Self::TaskStopped),
            STARTED => {
                let IdPayload { id } = serde_json::from_value(payload).map_err(invalid)?;
                Ok(Self::Started { id })
            }
            TIMEOUT => {
                let IdPayload { id } = serde_json::from_value(payload).map_err(invalid)?;
                Ok(Self::Timeout { id })
            }
            TIMEOUT_CLEARED => {
                let IdPayload { id } = serde_json::from_value(payload).map_err(invalid)?;
                Ok(Self::TimeoutCleared { id })
            }
            ERROR => {
                let MessagePayload { message } =
                    serde_json::from_value(payload).map_err(invalid)?;
                Ok(Self::Error { message })
            }
            other => Err(Error::unknown_event(other)),
        }
    }
}

impl TryFrom<NamedEvent> for TimerEvent {
    type Error = Error;

    fn try_from(event: NamedEvent) -> Result<Self> {
        Self::from_named(&event.name, event.payload)
    }
}

impl From<&bgtimer_core::Error> for TimerEvent {
    fn from(err: &bgtimer_core::Error) -> Self {
        Self::error(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use proptest::prelude::*;

    fn id(raw: u64) -> TimerId {
        TimerId::new(raw).unwrap()
    }

    #[test]
    fn test_event_names() {
        assert_eq!(TimerEvent::TaskStarted.name(), "backgroundTimer.taskStarted");
        assert_eq!(
            TimerEvent::TimeoutCleared { id: id(1) }.name(),
            "backgroundTimer.timeoutCleared"
        );
        assert_eq!(TimerEvent::error("x").name(), "backgroundTimer.error");
    }

    #[test]
    fn test_task_payload_carries_status() {
        assert_eq!(TimerEvent::TaskStarted.payload(), json!({"status": "running"}));
        assert_eq!(TimerEvent::TaskStopped.payload(), json!({"status": "stopped"}));
    }

    #[test]
    fn test_timer_payload_carries_id() {
        assert_eq!(TimerEvent::Timeout { id: id(9) }.payload(), json!({"id": 9}));
        assert_eq!(TimerEvent::Timeout { id: id(9) }.timer_id(), Some(id(9)));
        assert_eq!(TimerEvent::TaskStopped.timer_id(), None);
    }

    #[test]
    fn test_error_event_from_core_error() {
        let event = TimerEvent::from(&bgtimer_core::Error::not_found(id(4)));
        assert!(event.is_error());
        assert_eq!(event.payload(), json!({"message": "Timeout 4 is not found."}));
    }

    #[test]
    fn test_from_named_rejects_unknown_name() {
        let err = TimerEvent::from_named("backgroundTimer.tick", json!({})).unwrap_err();
        assert!(err.to_string().contains("backgroundTimer.tick"));
    }

    #[test]
    fn test_from_named_rejects_zero_id() {
        assert!(TimerEvent::from_named(TIMEOUT, json!({"id": 0})).is_err());
        assert!(TimerEvent::from_named(TIMEOUT, json!({"status": "running"})).is_err());
    }

    #[test]
    fn test_all_names_are_distinct() {
        let names: HashSet<&str> = ALL_NAMES.iter().copied().collect();
        assert_eq!(names.len(), ALL_NAMES.len());
    }

    fn any_event() -> impl Strategy<Value = TimerEvent> {
        prop_oneof![
            Just(TimerEvent::TaskStarted),
            Just(TimerEvent::TaskStopped),
            (1u64..).prop_map(|raw| TimerEvent::Started { id: id(raw) }),
            (1u64..).prop_map(|raw| TimerEvent::Timeout { id: id(raw) }),
            (1u64..).prop_map(|raw| TimerEvent::TimeoutCleared { id: id(raw) }),
            ".*".prop_map(|message| TimerEvent::Error { message }),
        ]
    }

    proptest! {
        #[test]
        fn prop_named_form_is_lossless(event in any_event()) {
            let parsed = TimerEvent::try_from(event.to_named()).unwrap();
            prop_assert_eq!(parsed, event);
        }
    }
}
