//! Shared value types.

use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// Identifier of a timer registration.
///
/// Always positive. Issued in strictly increasing order by the allocator and
/// never reused within a process, even after the timer fires or is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(NonZeroU64);

impl TimerId {
    /// The first identifier an allocator issues.
    pub const FIRST: Self = Self(NonZeroU64::MIN);

    /// Wrap a raw value. Returns `None` for zero.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// The raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// The identifier that follows this one, if the space is not exhausted.
    #[must_use]
    pub const fn successor(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TimerId> for u64 {
    fn from(id: TimerId) -> Self {
        id.get()
    }
}

/// Whether a registration fires once or keeps re-arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Fires once, then the registration is removed.
    Timeout,
    /// Re-armed under the same id after every fire until cleared.
    Interval,
}

impl TimerKind {
    /// Map the boolean repeat flag onto a kind.
    #[must_use]
    pub const fn from_repeating(repeating: bool) -> Self {
        if repeating { Self::Interval } else { Self::Timeout }
    }

    /// Check if the registration repeats.
    #[must_use]
    pub const fn is_repeating(self) -> bool {
        matches!(self, Self::Interval)
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Interval => write!(f, "interval"),
        }
    }
}

/// Whether the application wants timers to keep running in the background.
///
/// Independent from whether the platform grant is currently held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundExecutionState {
    #[default]
    Disabled,
    Enabled,
}

impl BackgroundExecutionState {
    /// Check if background execution is wanted.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Status carried by task-started and task-stopped notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Stopped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
