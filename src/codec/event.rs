//! Telemetry event types shared by the codec, the channels, and the bus.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A parsed telemetry event from the orientation sensor.
///
/// Events are immutable once constructed: the codec builds them, the bus
/// clones them to each subscriber. An `Orientation` event is never
/// constructed with a NaN or infinite field; the codec rejects such lines
/// before this type exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Fused orientation in degrees
    Orientation { roll: f64, pitch: f64, yaw: f64 },

    /// Sensor health flags (IMU and magnetometer)
    DeviceStatus { imu_ok: bool, mag_ok: bool },

    /// Transport announcement from the device (e.g. "WIFI", "USB")
    TransportMode { mode: String },
}

/// Which transport a line arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Serial,
    Udp,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Serial => write!(f, "serial"),
            Source::Udp => write!(f, "udp"),
        }
    }
}

/// One newline-delimited text frame from either transport.
///
/// Exists only across the codec call boundary: a channel builds it from a
/// complete line (already trimmed of surrounding whitespace) and hands it to
/// [`EventBus::ingest`](crate::bus::EventBus::ingest), which consumes it.
#[derive(Debug, Clone)]
pub struct RawLine {
    pub payload: String,
    pub source: Source,
    pub received_at: DateTime<Utc>,
}

impl RawLine {
    /// Wrap a trimmed line with its source tag and an arrival timestamp
    pub fn new(payload: impl Into<String>, source: Source) -> Self {
        Self {
            payload: payload.into(),
            source,
            received_at: Utc::now(),
        }
    }
}
