//! Process-wide telemetry counters.
//!
//! The bus is the only writer; channels never touch these directly. Counters
//! are atomics so concurrent publishes from the serial and UDP tasks cannot
//! lose updates; the last orientation sample sits behind a mutex because its
//! three fields must stay consistent with each other.

use crate::codec::{Source, TelemetryEvent};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Counters maintained by the event bus
#[derive(Debug, Default)]
pub struct TelemetryStats {
    serial_events: AtomicU64,
    udp_events: AtomicU64,
    rejected_lines: AtomicU64,
    orientation_events: AtomicU64,
    status_events: AtomicU64,
    last_sample: Mutex<Option<LastSample>>,
}

#[derive(Debug, Clone, Copy)]
struct LastSample {
    roll: f64,
    pitch: f64,
    yaw: f64,
    at: DateTime<Utc>,
}

/// Point-in-time copy of the counters, for logging and tests
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub serial_events: u64,
    pub udp_events: u64,
    pub rejected_lines: u64,
    pub orientation_events: u64,
    pub status_events: u64,
    pub last_orientation: Option<(f64, f64, f64)>,
    pub last_event_time: Option<DateTime<Utc>>,
}

impl StatsSnapshot {
    pub fn total_events(&self) -> u64 {
        self.serial_events + self.udp_events
    }
}

impl TelemetryStats {
    /// Record one published event from the given source
    pub fn record_event(&self, event: &TelemetryEvent, source: Source, at: DateTime<Utc>) {
        match source {
            Source::Serial => self.serial_events.fetch_add(1, Ordering::Relaxed),
            Source::Udp => self.udp_events.fetch_add(1, Ordering::Relaxed),
        };

        match event {
            TelemetryEvent::Orientation { roll, pitch, yaw } => {
                self.orientation_events.fetch_add(1, Ordering::Relaxed);
                let mut last = self.last_sample.lock().unwrap();
                *last = Some(LastSample {
                    roll: *roll,
                    pitch: *pitch,
                    yaw: *yaw,
                    at,
                });
            }
            TelemetryEvent::DeviceStatus { .. } => {
                self.status_events.fetch_add(1, Ordering::Relaxed);
                self.touch(at);
            }
            TelemetryEvent::TransportMode { .. } => {
                self.touch(at);
            }
        }
    }

    /// Record one rejected line
    pub fn record_rejection(&self) {
        self.rejected_lines.fetch_add(1, Ordering::Relaxed);
    }

    // Keep last_event_time moving for non-orientation events without
    // disturbing the stored sample values.
    fn touch(&self, at: DateTime<Utc>) {
        let mut last = self.last_sample.lock().unwrap();
        if let Some(sample) = last.as_mut() {
            sample.at = at;
        } else {
            *last = Some(LastSample {
                roll: 0.0,
                pitch: 0.0,
                yaw: 0.0,
                at,
            });
        }
    }

    /// Copy the current counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let last = *self.last_sample.lock().unwrap();
        StatsSnapshot {
            serial_events: self.serial_events.load(Ordering::Relaxed),
            udp_events: self.udp_events.load(Ordering::Relaxed),
            rejected_lines: self.rejected_lines.load(Ordering::Relaxed),
            orientation_events: self.orientation_events.load(Ordering::Relaxed),
            status_events: self.status_events.load(Ordering::Relaxed),
            last_orientation: last
                .filter(|_| self.orientation_events.load(Ordering::Relaxed) > 0)
                .map(|s| (s.roll, s.pitch, s.yaw)),
            last_event_time: last.map(|s| s.at),
        }
    }
}
