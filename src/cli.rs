//! CLI definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;
use std::time::Duration;

use bgtimer_core::LifecycleModel;
use clap::{Parser, ValueEnum};

use crate::demo::DemoPlan;

/// bgtimer - timeouts and intervals that survive backgrounding
#[derive(Parser, Debug)]
#[command(name = "bgtimer")]
#[command(version)]
#[command(about = "Run a timeout and an interval under a background execution grant")]
#[command(
    long_about = "Registers one timeout and one interval, holds a background grant while they run, prints every notification as it is published, then clears the interval and releases the grant."
)]
pub struct Cli {
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Timeout delay in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub timeout_ms: u64,

    /// Interval period in milliseconds
    #[arg(long, default_value_t = 250)]
    pub interval_ms: u64,

    /// How long to run before clearing the interval
    #[arg(long, default_value_t = 1_500)]
    pub run_for_ms: u64,

    /// Override the configured lifecycle model
    #[arg(long, value_enum)]
    pub lifecycle: Option<LifecycleArg>,

    /// Use a virtual clock instead of waiting in real time
    #[arg(long, default_value_t = false)]
    pub simulate: bool,
}

impl Cli {
    /// Timings requested on the command line.
    #[must_use]
    pub const fn plan(&self) -> DemoPlan {
        DemoPlan {
            timeout: Duration::from_millis(self.timeout_ms),
            interval: Duration::from_millis(self.interval_ms),
            run_for: Duration::from_millis(self.run_for_ms),
        }
    }
}

/// Lifecycle model as spelled on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleArg {
    Explicit,
    Automatic,
}

impl From<LifecycleArg> for LifecycleModel {
    fn from(arg: LifecycleArg) -> Self {
        match arg {
            LifecycleArg::Explicit => Self::Explicit,
            LifecycleArg::Automatic => Self::Automatic,
        }
    }
}
