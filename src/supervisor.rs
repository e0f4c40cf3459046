//! # Supervisor Module
//!
//! Process-wide lifecycle for the ingestion pipeline.
//!
//! This module handles:
//! - Starting the UDP channel unconditionally (cheap, and the wireless
//!   fallback path when no sensor is cabled up)
//! - Starting the serial channel when enabled, resolving the device from an
//!   explicit override or a one-shot port discovery at startup
//! - Broadcasting the shutdown signal and waiting, bounded, for every task
//!
//! Transport failures never reach this level as errors: a missing serial
//! device or a dead UDP bind each degrade to a log line and a pipeline with
//! fewer sources.

use crate::bus::EventBus;
use crate::config::Config;
use crate::serial::discovery::{auto_select, Discovery};
use crate::serial::SerialChannel;
use crate::udp::UdpChannel;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// How long shutdown waits for each task to acknowledge before giving up
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Owns the channel tasks and the shutdown signal
pub struct Supervisor {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Supervisor {
    /// Start the pipeline: stats logger, UDP channel, and (configuration
    /// permitting) the serial channel.
    pub async fn start(config: Config, bus: EventBus) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        let logger = bus.spawn_stats_logger(config.stats.log_interval(), shutdown_rx.clone());
        tasks.push(("stats", logger));

        // No retry on bind failure: a taken port is a configuration
        // conflict, not a transient condition
        match UdpChannel::bind(config.udp.clone(), bus.clone(), shutdown_rx.clone()).await {
            Ok(channel) => {
                tasks.push(("udp", tokio::spawn(channel.run())));
            }
            Err(e) => {
                error!("UDP channel disabled: {}", e);
            }
        }

        if config.serial.enabled {
            match resolve_serial_device(&config) {
                Some(device) => {
                    let channel = SerialChannel::new(
                        device,
                        config.serial.clone(),
                        bus.clone(),
                        shutdown_rx.clone(),
                    );
                    tasks.push(("serial", tokio::spawn(channel.run())));
                }
                None => {
                    info!("Serial: no device found, continuing without a serial source");
                }
            }
        } else {
            info!("Serial: disabled by configuration");
        }

        Self { shutdown_tx, tasks }
    }

    /// Broadcast shutdown and wait for every task, each bounded by
    /// [`SHUTDOWN_GRACE`]. Channels observe the signal after their current
    /// blocking call returns, so the worst case is one read timeout plus any
    /// retry delay in progress.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for (name, handle) in self.tasks {
            match timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("{} task ended abnormally: {}", name, e),
                Err(_) => warn!("{} task did not stop within {:?}", name, SHUTDOWN_GRACE),
            }
        }
        info!("Shutdown complete");
    }

    /// Number of running tasks (stats logger included)
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// Resolve the serial device path: an explicit override wins; otherwise
/// discovery runs once at startup (never re-run later) and the
/// USB-preferring tie-break picks a candidate.
fn resolve_serial_device(config: &Config) -> Option<String> {
    if let Some(device) = &config.serial.device {
        return Some(device.clone());
    }

    info!("Serial: scanning ports...");
    let discovery = Discovery::new(config.discovery.clone());
    let candidates = discovery.discover();
    let selected = auto_select(&candidates)?;
    info!(
        "Serial: auto-selected {} ({})",
        selected.path, selected.description
    );
    Some(selected.path.clone())
}
