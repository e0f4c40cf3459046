//! # Event Bus Module
//!
//! Fan-out distribution of parsed telemetry events.
//!
//! This module handles:
//! - Broadcasting every published event to all current subscribers
//! - The line-to-event ingest path shared by both transport channels
//! - Rejection logging policy (benign chatter vs. truly unknown lines)
//! - Telemetry counters and the periodic stats summary log
//!
//! Delivery is best-effort: each subscriber has a bounded queue, and a slow
//! subscriber drops its own oldest events rather than stalling publication.
//! Publish order is preserved per source.

pub mod stats;

pub use stats::{StatsSnapshot, TelemetryStats};

use crate::codec::{self, RawLine, RejectReason, Source, TelemetryEvent};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Per-subscriber queue capacity. Enough for bursts from a sensor streaming
/// at a few hundred lines per second; a lagging subscriber skips old events.
pub const DEFAULT_CAPACITY: usize = 64;

/// Unknown-line warnings carry at most this many characters of payload
const WARN_PAYLOAD_MAX: usize = 80;

/// Broadcast hub connecting the transport channels to subscribers.
///
/// Cheap to clone; all clones share the same subscriber set and counters.
///
/// # Examples
///
/// ```
/// use gyro_relay::bus::EventBus;
/// use gyro_relay::codec::{RawLine, Source};
///
/// let bus = EventBus::new();
/// let mut events = bus.subscribe();
/// bus.ingest(RawLine::new("EULER,1.0,2.0,3.0", Source::Udp));
/// assert!(events.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TelemetryEvent>,
    stats: Arc<TelemetryStats>,
}

impl EventBus {
    /// Create a bus with the default per-subscriber capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit per-subscriber capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            stats: Arc::new(TelemetryStats::default()),
        }
    }

    /// Subscribe to the event stream.
    ///
    /// The receiver observes every event published after this call, in
    /// publish order. If the subscriber falls more than the bus capacity
    /// behind, its oldest pending events are dropped (other subscribers are
    /// unaffected) and the receiver reports the gap as a lag error.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }

    /// Run a raw line through the codec, then publish or record the rejection
    pub fn ingest(&self, raw: RawLine) {
        match codec::parse(&raw.payload) {
            Ok(event) => {
                self.stats.record_event(&event, raw.source, raw.received_at);
                // Send fails only when no subscriber exists, which is fine
                let _ = self.tx.send(event);
            }
            Err(reason) => self.record_rejection(&raw, reason),
        }
    }

    /// Publish an already-constructed event, bypassing the codec
    pub fn publish(&self, event: TelemetryEvent, source: Source) {
        self.stats.record_event(&event, source, Utc::now());
        let _ = self.tx.send(event);
    }

    /// Counters shared with the stats logger and tests
    pub fn stats(&self) -> Arc<TelemetryStats> {
        Arc::clone(&self.stats)
    }

    fn record_rejection(&self, raw: &RawLine, reason: RejectReason) {
        match reason {
            // Blank frames between lines, nothing to report
            RejectReason::Empty => {}
            // Known device chatter stays out of the warning log
            RejectReason::Benign => {
                trace!("{}: device chatter: {:?}", raw.source, truncate(&raw.payload));
            }
            RejectReason::Unrecognized => {
                self.stats.record_rejection();
                warn!("{}: unknown line: {:?}", raw.source, truncate(&raw.payload));
            }
            reason => {
                self.stats.record_rejection();
                debug!(
                    "{}: rejected line ({}): {:?}",
                    raw.source,
                    reason,
                    truncate(&raw.payload)
                );
            }
        }
    }

    /// Spawn the periodic stats summary task.
    ///
    /// Logs orientation/status/rejection totals and the last orientation
    /// sample at a fixed interval, once events have started arriving. Stops
    /// when the shutdown signal fires.
    pub fn spawn_stats_logger(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let stats = self.stats();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so summaries
            // start one full interval in.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        let snap = stats.snapshot();
                        if snap.total_events() == 0 {
                            continue;
                        }
                        match snap.last_orientation {
                            Some((roll, pitch, yaw)) => info!(
                                "Telemetry: {} orientation | {} status | {} rejected | roll={:.2} pitch={:.2} yaw={:.2}",
                                snap.orientation_events,
                                snap.status_events,
                                snap.rejected_lines,
                                roll, pitch, yaw,
                            ),
                            None => info!(
                                "Telemetry: {} orientation | {} status | {} rejected",
                                snap.orientation_events,
                                snap.status_events,
                                snap.rejected_lines,
                            ),
                        }
                    }
                }
            }
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(payload: &str) -> &str {
    match payload.char_indices().nth(WARN_PAYLOAD_MAX) {
        Some((idx, _)) => &payload[..idx],
        None => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn ingest_serial(bus: &EventBus, line: &str) {
        bus.ingest(RawLine::new(line, Source::Serial));
    }

    #[tokio::test]
    async fn test_euler_line_reaches_subscriber() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();

        ingest_serial(&bus, "EULER,1.50,-2.25,90.00");

        assert_eq!(
            events.try_recv().unwrap(),
            TelemetryEvent::Orientation {
                roll: 1.5,
                pitch: -2.25,
                yaw: 90.0,
            }
        );
    }

    #[tokio::test]
    async fn test_status_line_reaches_subscriber() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();

        ingest_serial(&bus, "STATUS,1,0");

        assert_eq!(
            events.try_recv().unwrap(),
            TelemetryEvent::DeviceStatus {
                imu_ok: true,
                mag_ok: false,
            }
        );
    }

    #[tokio::test]
    async fn test_transport_line_mode_trimmed() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();

        bus.ingest(RawLine::new("TRANSPORT, WIFI", Source::Udp));

        assert_eq!(
            events.try_recv().unwrap(),
            TelemetryEvent::TransportMode {
                mode: "WIFI".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_non_finite_line_rejected_not_published() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();

        ingest_serial(&bus, "EULER,nan,0,0");

        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(bus.stats().snapshot().rejected_lines, 1);
    }

    #[tokio::test]
    async fn test_unrecognized_line_counted_no_event() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();

        ingest_serial(&bus, "GARBAGE_DATA_XYZ");

        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(bus.stats().snapshot().rejected_lines, 1);
    }

    #[tokio::test]
    async fn test_benign_and_empty_lines_not_counted() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();

        ingest_serial(&bus, "");
        ingest_serial(&bus, "WiFi: Connected! IP = 10.0.0.17");
        ingest_serial(&bus, "=== ESP32 Hardware Check ===");

        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(bus.stats().snapshot().rejected_lines, 0);
    }

    #[tokio::test]
    async fn test_fan_out_all_subscribers_in_order() {
        let bus = EventBus::new();
        let mut subs: Vec<_> = (0..3).map(|_| bus.subscribe()).collect();

        for yaw in 0..5 {
            ingest_serial(&bus, &format!("EULER,0,0,{}", yaw));
        }

        for sub in subs.iter_mut() {
            for yaw in 0..5 {
                match sub.try_recv().unwrap() {
                    TelemetryEvent::Orientation { yaw: got, .. } => {
                        assert_eq!(got, yaw as f64);
                    }
                    other => panic!("Expected Orientation, got: {:?}", other),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_stalled_subscriber_drops_without_blocking_others() {
        // Capacity 4: the stalled subscriber can only hold 4 pending events
        let bus = EventBus::with_capacity(4);
        let mut stalled = bus.subscribe();
        let mut healthy = bus.subscribe();

        // Publish more than the stalled subscriber's queue can hold, while
        // the healthy subscriber keeps draining
        for yaw in 0..10 {
            ingest_serial(&bus, &format!("EULER,0,0,{}", yaw));
            match healthy.try_recv().unwrap() {
                TelemetryEvent::Orientation { yaw: got, .. } => {
                    assert_eq!(got, yaw as f64);
                }
                other => panic!("Expected Orientation, got: {:?}", other),
            }
        }

        // The stalled subscriber observes a lag gap, then the newest events
        match stalled.try_recv() {
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                assert!(skipped > 0, "expected a lag gap");
            }
            other => panic!("Expected Lagged, got: {:?}", other),
        }
        let mut seen = Vec::new();
        while let Ok(event) = stalled.try_recv() {
            if let TelemetryEvent::Orientation { yaw, .. } = event {
                seen.push(yaw);
            }
        }
        // Oldest events were dropped; what survives is in publish order
        assert!(!seen.is_empty());
        let mut sorted = seen.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, sorted);
        assert_eq!(seen.last().copied(), Some(9.0));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        bus.publish(
            TelemetryEvent::TransportMode {
                mode: "USB".to_string(),
            },
            Source::Serial,
        );
        assert_eq!(bus.stats().snapshot().total_events(), 1);
    }

    #[tokio::test]
    async fn test_events_counted_by_source() {
        let bus = EventBus::new();
        bus.ingest(RawLine::new("EULER,1,2,3", Source::Serial));
        bus.ingest(RawLine::new("EULER,4,5,6", Source::Udp));
        bus.ingest(RawLine::new("STATUS,1,1", Source::Udp));

        let snap = bus.stats().snapshot();
        assert_eq!(snap.serial_events, 1);
        assert_eq!(snap.udp_events, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_logger_stops_on_shutdown() {
        let bus = EventBus::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = bus.spawn_stats_logger(Duration::from_secs(5), shutdown_rx);

        ingest_serial(&bus, "EULER,1,2,3");
        tokio::time::advance(Duration::from_secs(11)).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn test_truncate_limits_warning_payload() {
        let long: String = "X".repeat(200);
        assert_eq!(truncate(&long).len(), WARN_PAYLOAD_MAX);
        assert_eq!(truncate("short"), "short");
    }
}
