//! Core error types for bgtimer operations.
//!
//! Every detected condition is local and non-fatal. Operations return these
//! synchronously; the relay additionally broadcasts the message as an
//! error notification.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::LifecycleModel;
use crate::types::TimerId;

/// Core error type for bgtimer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // Background execution guard
    #[error("Background task is already running")]
    AlreadyRunning,

    #[error("Background task is not running")]
    NotRunning,

    #[error("Failed to start background task: {reason}")]
    AcquireFailed { reason: String },

    #[error("{operation} is not available with the {model} lifecycle model")]
    LifecycleMismatch {
        operation: &'static str,
        model: LifecycleModel,
    },

    // Timer registry
    #[error("Timeout {id} is not found.")]
    NotFound { id: TimerId },

    #[error("invalid timer duration: {reason}")]
    InvalidDuration { reason: String },

    #[error("timer identifier space exhausted")]
    IdsExhausted,

    // Configuration
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to read config '{path}': {reason}")]
    ConfigReadFailed { path: PathBuf, reason: String },

    #[error("config parse error: {reason}")]
    ConfigParseFailed { reason: String },

    // Plumbing
    #[error("no async runtime available: {reason}")]
    RuntimeUnavailable { reason: String },
}

/// Copyable discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyRunning,
    NotRunning,
    AcquireFailed,
    LifecycleMismatch,
    NotFound,
    InvalidDuration,
    IdsExhausted,
    InvalidConfig,
    ConfigReadFailed,
    ConfigParseFailed,
    RuntimeUnavailable,
}

impl Error {
    /// Create an acquire failed error.
    pub fn acquire_failed(reason: impl Into<String>) -> Self {
        Self::AcquireFailed {
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub const fn not_found(id: TimerId) -> Self {
        Self::NotFound { id }
    }

    /// Create an invalid duration error.
    pub fn invalid_duration(reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a config read error.
    pub fn config_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a config parse error.
    pub fn config_parse_failed(reason: impl Into<String>) -> Self {
        Self::ConfigParseFailed {
            reason: reason.into(),
        }
    }

    /// Create a runtime unavailable error.
    pub fn runtime_unavailable(reason: impl Into<String>) -> Self {
        Self::RuntimeUnavailable {
            reason: reason.into(),
        }
    }

    /// Check if this error belongs to the advisory taxonomy that is also
    /// broadcast as an error notification.
    #[must_use]
    pub const fn is_advisory(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning | Self::NotRunning | Self::AcquireFailed { .. } | Self::NotFound { .. }
        )
    }

    /// The discriminant of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRunning => ErrorKind::AlreadyRunning,
            Self::NotRunning => ErrorKind::NotRunning,
            Self::AcquireFailed { .. } => ErrorKind::AcquireFailed,
            Self::LifecycleMismatch { .. } => ErrorKind::LifecycleMismatch,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidDuration { .. } => ErrorKind::InvalidDuration,
            Self::IdsExhausted => ErrorKind::IdsExhausted,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            Self::ConfigReadFailed { .. } => ErrorKind::ConfigReadFailed,
            Self::ConfigParseFailed { .. } => ErrorKind::ConfigParseFailed,
            Self::RuntimeUnavailable { .. } => ErrorKind::RuntimeUnavailable,
        }
    }
}
