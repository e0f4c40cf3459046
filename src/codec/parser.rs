//! # Line Parser
//!
//! Parses one telemetry line into a [`TelemetryEvent`] or a [`RejectReason`].
//!
//! The sensor emits ASCII, newline-terminated, comma-separated records:
//!
//! ```text
//! EULER,<roll>,<pitch>,<yaw>
//! STATUS,<imu 0|1>,<mag 0|1>
//! TRANSPORT,<mode>
//! ```
//!
//! Anything else is either benign boot/diagnostic chatter (recognized by
//! prefix and kept out of the warning log) or an unrecognized line the
//! caller should surface.

use super::event::TelemetryEvent;
use thiserror::Error;

/// Prefixes of non-protocol lines the device is known to print: the boot
/// banner ("=== ESP32 Hardware Check ==="), WiFi/sensor init progress, and
/// diagnostic dumps. These are classified [`RejectReason::Benign`] so they
/// never show up as warnings.
const BENIGN_PREFIXES: &[&str] = &["=", "WiFi", "MPU", "HMC", "ERROR", "DIAG"];

/// Why a line was not turned into an event
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    /// Line was empty after trimming
    #[error("empty line")]
    Empty,

    /// Known device chatter (boot banner, init progress); not worth a warning
    #[error("benign non-protocol line")]
    Benign,

    /// Line does not match any recognized frame tag
    #[error("unrecognized line")]
    Unrecognized,

    /// Recognized tag but wrong number of comma-separated fields
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    /// A value failed to parse as a number
    #[error("value {value:?} is not a number")]
    NumericParse { value: String },

    /// A parsed value was NaN or infinite
    #[error("value {value} is not finite")]
    NonFinite { value: f64 },
}

/// Parse one telemetry line.
///
/// Pure and stateless: the same input always yields the same result. The
/// input must already be stripped of trailing whitespace/newline.
///
/// # Examples
///
/// ```
/// use gyro_relay::codec::{parse, TelemetryEvent};
///
/// let event = parse("EULER,1.50,-2.25,90.00").unwrap();
/// assert_eq!(event, TelemetryEvent::Orientation { roll: 1.5, pitch: -2.25, yaw: 90.0 });
/// ```
pub fn parse(line: &str) -> Result<TelemetryEvent, RejectReason> {
    if line.is_empty() {
        return Err(RejectReason::Empty);
    }

    let fields: Vec<&str> = line.split(',').collect();

    match fields[0] {
        "EULER" => parse_euler(&fields),
        "STATUS" => parse_status(&fields),
        "TRANSPORT" => parse_transport(&fields),
        _ => {
            if BENIGN_PREFIXES.iter().any(|p| line.starts_with(p)) {
                Err(RejectReason::Benign)
            } else {
                Err(RejectReason::Unrecognized)
            }
        }
    }
}

fn parse_euler(fields: &[&str]) -> Result<TelemetryEvent, RejectReason> {
    if fields.len() != 4 {
        return Err(RejectReason::FieldCount {
            expected: 4,
            found: fields.len(),
        });
    }

    let mut values = [0.0f64; 3];
    for (slot, field) in values.iter_mut().zip(&fields[1..4]) {
        let value: f64 = field
            .trim()
            .parse()
            .map_err(|_| RejectReason::NumericParse {
                value: (*field).to_string(),
            })?;
        if !value.is_finite() {
            return Err(RejectReason::NonFinite { value });
        }
        *slot = value;
    }

    Ok(TelemetryEvent::Orientation {
        roll: values[0],
        pitch: values[1],
        yaw: values[2],
    })
}

fn parse_status(fields: &[&str]) -> Result<TelemetryEvent, RejectReason> {
    if fields.len() != 3 {
        return Err(RejectReason::FieldCount {
            expected: 3,
            found: fields.len(),
        });
    }

    let mut flags = [false; 2];
    for (slot, field) in flags.iter_mut().zip(&fields[1..3]) {
        let value: i64 = field
            .trim()
            .parse()
            .map_err(|_| RejectReason::NumericParse {
                value: (*field).to_string(),
            })?;
        // The firmware emits 0 or 1; anything else is treated as not-ok
        *slot = value == 1;
    }

    Ok(TelemetryEvent::DeviceStatus {
        imu_ok: flags[0],
        mag_ok: flags[1],
    })
}

fn parse_transport(fields: &[&str]) -> Result<TelemetryEvent, RejectReason> {
    if fields.len() != 2 {
        return Err(RejectReason::FieldCount {
            expected: 2,
            found: fields.len(),
        });
    }

    Ok(TelemetryEvent::TransportMode {
        mode: fields[1].trim().to_string(),
    })
}
