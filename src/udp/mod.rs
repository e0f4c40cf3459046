//! # UDP Channel Module
//!
//! Always-on UDP listener for the sensor's WiFi transport.
//!
//! Unlike the serial channel there is no reconnect logic: a bind failure
//! almost always means a configuration conflict rather than transient
//! hardware absence, so it disables this channel outright. Once bound, the
//! socket lives until shutdown; transient receive errors are logged and
//! ridden out with a short delay.

use crate::bus::EventBus;
use crate::codec::{RawLine, Source};
use crate::config::UdpConfig;
use crate::error::{GyroRelayError, Result};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Largest datagram the sensor sends. The device emits one frame per
/// datagram; multi-line payloads are not split and will simply fail to
/// parse as a single tagged record.
const MAX_DATAGRAM_SIZE: usize = 1024;

/// UDP transport channel
pub struct UdpChannel {
    socket: UdpSocket,
    config: UdpConfig,
    bus: EventBus,
    shutdown: watch::Receiver<bool>,
}

impl UdpChannel {
    /// Bind the listen socket on `0.0.0.0:<port>`.
    ///
    /// # Errors
    ///
    /// Returns [`GyroRelayError::UdpBind`] when the port cannot be bound;
    /// the caller decides whether the process continues without this channel.
    pub async fn bind(
        config: UdpConfig,
        bus: EventBus,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", config.port))
            .await
            .map_err(|source| GyroRelayError::UdpBind {
                port: config.port,
                source,
            })?;
        info!("UDP: listening on port {}", config.port);
        Ok(Self {
            socket,
            config,
            bus,
            shutdown,
        })
    }

    /// The bound address; useful when bound to an ephemeral port in tests
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive datagrams until shutdown. Each datagram is one candidate
    /// line: lossy-decoded, trimmed, and handed to the bus.
    pub async fn run(mut self) {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                result = timeout(self.config.recv_timeout(), self.socket.recv_from(&mut buf)) => {
                    match result {
                        // Quiet interval, not an error
                        Err(_) => continue,
                        Ok(Ok((len, _peer))) => {
                            let text = String::from_utf8_lossy(&buf[..len]);
                            let line = text.trim();
                            if !line.is_empty() {
                                self.bus.ingest(RawLine::new(line, Source::Udp));
                            }
                        }
                        Ok(Err(e)) => {
                            // The socket is never torn down on a receive
                            // error, only on shutdown
                            warn!("UDP: receive error: {}", e);
                            tokio::select! {
                                _ = self.shutdown.changed() => break,
                                _ = sleep(self.config.error_delay()) => {}
                            }
                        }
                    }
                }
            }
        }
        debug!("UDP: channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TelemetryEvent;
    use std::time::Duration;

    fn test_config() -> UdpConfig {
        UdpConfig {
            // Ephemeral port so tests never collide
            port: 0,
            recv_timeout_ms: 1000,
            error_delay_ms: 500,
        }
    }

    async fn bound_channel(bus: &EventBus) -> (UdpChannel, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let channel = UdpChannel::bind(test_config(), bus.clone(), shutdown_rx)
            .await
            .unwrap();
        (channel, shutdown_tx)
    }

    #[tokio::test]
    async fn test_datagram_becomes_event() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let (channel, shutdown_tx) = bound_channel(&bus).await;
        let addr = channel.local_addr().unwrap();

        let handle = tokio::spawn(channel.run());

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"EULER,1.50,-2.25,90.00\n", ("127.0.0.1", addr.port()))
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no event within 5s")
            .unwrap();
        assert_eq!(
            event,
            TelemetryEvent::Orientation {
                roll: 1.5,
                pitch: -2.25,
                yaw: 90.0,
            }
        );
        assert_eq!(bus.stats().snapshot().udp_events, 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_datagram_payload_is_trimmed() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let (channel, shutdown_tx) = bound_channel(&bus).await;
        let addr = channel.local_addr().unwrap();

        let handle = tokio::spawn(channel.run());

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"  TRANSPORT, WIFI \n", ("127.0.0.1", addr.port()))
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no event within 5s")
            .unwrap();
        assert_eq!(
            event,
            TelemetryEvent::TransportMode {
                mode: "WIFI".to_string(),
            }
        );

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_multi_line_datagram_is_not_split() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let (channel, shutdown_tx) = bound_channel(&bus).await;
        let addr = channel.local_addr().unwrap();

        let handle = tokio::spawn(channel.run());

        // Two frames glued into one datagram do not parse as one record
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(
                b"EULER,1,2,3\nEULER,4,5,6",
                ("127.0.0.1", addr.port()),
            )
            .await
            .unwrap();
        // A well-formed single-frame datagram afterwards still parses
        sender
            .send_to(b"STATUS,1,1", ("127.0.0.1", addr.port()))
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no event within 5s")
            .unwrap();
        assert_eq!(
            event,
            TelemetryEvent::DeviceStatus {
                imu_ok: true,
                mag_ok: true,
            }
        );
        assert_eq!(bus.stats().snapshot().rejected_lines, 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_reports_port() {
        // Bind once, then try the same concrete port again
        let first = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let taken = first.local_addr().unwrap().port();

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = UdpConfig {
            port: taken,
            recv_timeout_ms: 1000,
            error_delay_ms: 500,
        };
        let result = UdpChannel::bind(config, EventBus::new(), shutdown_rx).await;
        match result {
            Err(GyroRelayError::UdpBind { port, .. }) => assert_eq!(port, taken),
            other => panic!("Expected UdpBind error, got: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop_promptly() {
        let bus = EventBus::new();
        let (channel, shutdown_tx) = bound_channel(&bus).await;
        let handle = tokio::spawn(channel.run());

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle)
            .await
            .expect("channel did not stop")
            .unwrap();
    }
}
