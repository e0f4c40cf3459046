//! # Gyro Relay
//!
//! Ingests orientation-sensor telemetry over serial and UDP and republishes
//! parsed events to subscribers.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber
//!    - Load configuration (first CLI argument, or `config/default.toml`)
//!    - Start the supervisor: UDP channel always, serial channel when
//!      enabled (auto-discovering the device if none is configured)
//!
//! 2. **Steady state**
//!    - Channels read, parse, and publish telemetry until stopped
//!    - A summary of event counts is logged periodically
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C broadcasts the shutdown signal
//!    - Both channels close their handles and acknowledge within their
//!      read timeouts

use anyhow::Result;
use tracing::info;

use gyro_relay::bus::EventBus;
use gyro_relay::config::Config;
use gyro_relay::supervisor::Supervisor;

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Gyro Relay v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)?;

    let bus = EventBus::new();
    let supervisor = Supervisor::start(config, bus).await;

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");

    supervisor.shutdown().await;
    Ok(())
}
