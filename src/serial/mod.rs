//! # Serial Channel Module
//!
//! Owns the serial connection to the orientation sensor.
//!
//! This module handles:
//! - Opening the device at the configured baud rate (default 921,600)
//! - Reading telemetry lines with a short, bounded timeout
//! - Auto-reconnect with a fixed backoff, forever, until shutdown
//! - Feeding complete lines to the event bus
//!
//! The channel is a single task driving a small state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> (I/O error) -> Disconnected
//!                      ^                                         |
//!                      +------------- retry delay ---------------+
//! ```
//!
//! `Closing` is terminal and only entered on the shutdown signal. A read
//! never blocks longer than the configured timeout, which bounds worst-case
//! shutdown latency.

pub mod discovery;
pub mod port_trait;

use crate::bus::EventBus;
use crate::codec::{RawLine, Source};
use crate::config::SerialConfig;
use port_trait::{PortOpener, PortReader, TokioPortOpener};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Connection lifecycle of a transport channel.
///
/// Owned exclusively by the channel; other components may only observe it
/// through the watch handle returned by [`SerialChannel::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Outcome of one connected read session
enum ReadOutcome {
    /// Shutdown signal observed; stop the channel
    Shutdown,
    /// Device vanished or errored; reconnect after the backoff delay
    Disconnected,
}

/// Serial transport channel with auto-reconnect
pub struct SerialChannel {
    device: String,
    config: SerialConfig,
    bus: EventBus,
    shutdown: watch::Receiver<bool>,
    opener: Arc<dyn PortOpener>,
    state_tx: watch::Sender<ChannelState>,
}

impl SerialChannel {
    /// Channel for a real device path
    pub fn new(
        device: String,
        config: SerialConfig,
        bus: EventBus,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self::with_opener(device, config, bus, shutdown, Arc::new(TokioPortOpener))
    }

    /// Channel over a custom port opener (used by tests)
    pub fn with_opener(
        device: String,
        config: SerialConfig,
        bus: EventBus,
        shutdown: watch::Receiver<bool>,
        opener: Arc<dyn PortOpener>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        Self {
            device,
            config,
            bus,
            shutdown,
            opener,
            state_tx,
        }
    }

    /// Observe the channel's connection state
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Drive the connect/read/reconnect loop until shutdown.
    ///
    /// The reconnect loop is intentionally unbounded: the sensor may be
    /// unplugged and reattached at any time, and a permanently absent device
    /// simply means periodic retry log lines, never a crash.
    pub async fn run(mut self) {
        while !*self.shutdown.borrow() {
            self.set_state(ChannelState::Connecting);
            let opened = self
                .opener
                .open(&self.device, self.config.baud_rate, self.config.read_timeout())
                .await;
            match opened {
                Ok(port) => {
                    info!(
                        "Serial: connected to {} at {} baud",
                        self.device, self.config.baud_rate
                    );
                    self.set_state(ChannelState::Connected);
                    let outcome = self.read_loop(port).await;
                    match outcome {
                        ReadOutcome::Shutdown => break,
                        ReadOutcome::Disconnected => {
                            warn!("Serial: lost connection to {}, reconnecting...", self.device);
                        }
                    }
                }
                Err(e) => {
                    info!("Serial: waiting for {}... ({})", self.device, e);
                }
            }
            self.set_state(ChannelState::Disconnected);

            // Fixed backoff before the next attempt, cancellable by shutdown
            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = sleep(self.config.reconnect_delay()) => {}
            }
        }
        self.set_state(ChannelState::Closing);
        debug!("Serial: channel closed");
    }

    /// Read lines while connected. The port handle is dropped (closed) when
    /// this returns, whatever the reason.
    async fn read_loop(&mut self, port: PortReader) -> ReadOutcome {
        let mut reader = BufReader::new(port);
        let mut buf: Vec<u8> = Vec::new();
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => return ReadOutcome::Shutdown,
                result = timeout(self.config.read_timeout(), reader.read_until(b'\n', &mut buf)) => {
                    match result {
                        // Timeout with no complete line is not an error; any
                        // partial bytes stay in buf for the next pass
                        Err(_) => continue,
                        Ok(Ok(0)) => {
                            debug!("Serial: EOF on {}", self.device);
                            return ReadOutcome::Disconnected;
                        }
                        Ok(Ok(_)) => {
                            if buf.last() == Some(&b'\n') {
                                let text = String::from_utf8_lossy(&buf);
                                let line = text.trim();
                                if !line.is_empty() {
                                    self.bus.ingest(RawLine::new(line, Source::Serial));
                                }
                                buf.clear();
                            }
                            // Bytes without a trailing newline mean the device
                            // stopped mid-line; the next read settles it
                        }
                        Ok(Err(e)) => {
                            warn!("Serial: read error on {}: {}", self.device, e);
                            return ReadOutcome::Disconnected;
                        }
                    }
                }
            }
        }
    }

    fn set_state(&self, state: ChannelState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Serial: {:?} -> {:?}", previous, state);
        }
    }
}
