//! # bgtimer - demo binary
//!
//! Runs one timeout and one interval under a background execution grant and
//! prints every notification as `<name> <payload>`.
//!
//! ## Sequence
//!
//! 1. **Config** - load the TOML file given with `--config`, or use defaults
//! 2. **Tracing** - `RUST_LOG`, falling back to the configured filter
//! 3. **Run** - acquire the grant, register the timers, wait, clear, release

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::time::Instant;

use anyhow::{Context, Result};
use bgtimer::cli::Cli;
use bgtimer::demo;
use bgtimer_core::TimerConfig;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_tracing(&config.log_filter);

    let start_time = Instant::now();
    info!(
        lifecycle = %config.lifecycle,
        simulate = cli.simulate,
        "bgtimer demo starting"
    );

    let report = demo::run(config, cli.plan(), cli.simulate)
        .await
        .context("Demo run failed")?;

    for event in &report.notifications {
        let named = event.to_named();
        println!("{} {}", named.name, named.payload);
    }

    info!(
        timeout_fires = report.timeout_fires,
        interval_fires = report.interval_fires,
        elapsed = ?start_time.elapsed(),
        "bgtimer demo finished"
    );
    Ok(())
}

/// Load the config file if one was given and apply CLI overrides.
fn load_config(cli: &Cli) -> Result<TimerConfig> {
    let mut config = match &cli.config {
        Some(path) => TimerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TimerConfig::default(),
    };

    if let Some(lifecycle) = cli.lifecycle {
        config.lifecycle = lifecycle.into();
    }
    Ok(config)
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing(fallback: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
