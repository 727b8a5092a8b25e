//! Configuration for the background timer runtime.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::result::Result;

/// How the background execution grant is driven.
///
/// A runtime is bound to exactly one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleModel {
    /// The application calls `start_background_task` / `stop_background_task`.
    Explicit,
    /// The application toggles a flag; the grant follows foreground/background
    /// transitions while the flag is enabled.
    #[default]
    Automatic,
}

impl fmt::Display for LifecycleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Automatic => write!(f, "automatic"),
        }
    }
}

/// Configuration for the background timer runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Which lifecycle model the guard exposes.
    #[serde(default)]
    pub lifecycle: LifecycleModel,

    /// Longest time the platform grant may be held before it lapses.
    #[serde(default = "default_wake_lock_timeout_ms")]
    pub wake_lock_timeout_ms: u64,

    /// Label handed to the platform grant.
    #[serde(default = "default_task_name")]
    pub task_name: String,

    /// Refuse timer operations while no grant is held.
    #[serde(default)]
    pub require_active_task: bool,

    /// Capacity of the notification broadcast channel.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleModel::default(),
            wake_lock_timeout_ms: default_wake_lock_timeout_ms(),
            task_name: default_task_name(),
            require_active_task: false,
            notification_capacity: default_notification_capacity(),
            log_filter: default_log_filter(),
        }
    }
}

impl TimerConfig {
    /// Create a new config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lifecycle model.
    #[must_use]
    pub const fn with_lifecycle(mut self, lifecycle: LifecycleModel) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Require a held grant for timer operations.
    #[must_use]
    pub const fn with_require_active_task(mut self, require: bool) -> Self {
        self.require_active_task = require;
        self
    }

    /// Set the grant hold limit.
    #[must_use]
    pub const fn with_wake_lock_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.wake_lock_timeout_ms = timeout_ms;
        self
    }

    /// The grant hold limit as a `Duration`.
    #[must_use]
    pub const fn wake_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.wake_lock_timeout_ms)
    }

    /// Parse a config from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigParseFailed` on malformed TOML and `InvalidConfig` if
    /// validation fails.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::config_parse_failed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigReadFailed` if the file cannot be read, otherwise the
    /// errors of [`TimerConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config_read_failed(path, e.to_string()))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), lifecycle = %config.lifecycle, "Loaded timer config");
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a field is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.wake_lock_timeout_ms == 0 {
            return Err(Error::invalid_config(
                "wake_lock_timeout_ms must be greater than 0",
            ));
        }

        if self.notification_capacity == 0 {
            return Err(Error::invalid_config(
                "notification_capacity must be greater than 0",
            ));
        }

        if self.task_name.trim().is_empty() {
            return Err(Error::invalid_config("task_name must not be empty"));
        }

        Ok(())
    }
}

const fn default_wake_lock_timeout_ms() -> u64 {
    180_000
}

fn default_task_name() -> String {
    "ExpoBackgroundTimer::Wakelock".to_string()
}

const fn default_notification_capacity() -> usize {
    1000
}

fn default_log_filter() -> String {
    "info".to_string()
}
