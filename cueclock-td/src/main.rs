//! CueClock Timing Daemon (cueclock-td) - Main entry point
//!
//! Resolves rundown timing once per tick and serves the resulting snapshots
//! to local subscribers and remote SSE consumers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cueclock_common::config::TimingConfig;
use cueclock_td::scheduler::{SchedulerConfig, TickScheduler};
use cueclock_td::server::{self, AppState};
use cueclock_td::sources::{SharedRundown, SystemClock};
use cueclock_td::sse::EventBroadcaster;

/// Command-line arguments for cueclock-td
#[derive(Parser, Debug)]
#[command(name = "cueclock-td")]
#[command(about = "Rundown timing daemon for CueClock")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "CUECLOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address override, e.g. 127.0.0.1:5750
    #[arg(short, long, env = "CUECLOCK_TD_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cueclock_td=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let mut config =
        TimingConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    info!(
        "Starting CueClock timing daemon: {:?} tick, low resolution every {} ticks",
        config.tick_interval(),
        config.low_resolution_every
    );

    // The rundown store is fed through the HTTP input endpoints
    let rundown = SharedRundown::new();
    let events = EventBroadcaster::new(config.event_buffer);

    let scheduler = Arc::new(
        TickScheduler::new(
            SchedulerConfig::from(&config),
            Arc::new(rundown.clone()),
            Arc::new(SystemClock),
        )
        .context("Failed to create tick scheduler")?,
    );
    scheduler.start().context("Failed to start tick scheduler")?;
    info!("Tick scheduler running");

    let state = AppState {
        scheduler: Arc::clone(&scheduler),
        rundown,
        events,
    };

    let bind_address = config.bind_address.clone();
    tokio::select! {
        result = server::start(&bind_address, state) => {
            result.context("HTTP server failed")?;
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    scheduler.stop().await;
    info!("CueClock timing daemon stopped");

    Ok(())
}
