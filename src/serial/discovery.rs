//! # Port Discovery
//!
//! Enumerates candidate serial devices and picks one to connect to.
//!
//! Enumeration goes through the [`PortEnumerator`] trait so the filtering
//! and selection logic is testable without hardware; the system
//! implementation uses the OS serial port list exposed by tokio-serial.
//!
//! Filtering policy:
//! - Paths containing a configured ignore substring are dropped (system
//!   ports such as the macOS Bluetooth and debug consoles).
//! - An empty allow list accepts every remaining candidate; a populated one
//!   restricts discovery to exact path membership.
//! - Survivors are open/close probed; a failed probe drops the candidate
//!   silently, since unopenable ports are expected, not exceptional.

use crate::config::DiscoveryConfig;
use tracing::debug;

/// A candidate serial device produced by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    /// Device path (e.g. "/dev/ttyUSB0" or "/dev/cu.usbmodem101")
    pub path: String,

    /// Human-readable description, typically the USB product string
    pub description: String,
}

/// Pluggable serial port enumeration and probing capability
pub trait PortEnumerator: Send + Sync {
    /// List OS-visible serial devices in a deterministic order
    fn enumerate(&self) -> Vec<PortCandidate>;

    /// Open/close probe; `false` means the device cannot be opened
    fn probe(&self, path: &str) -> bool;
}

/// Enumerator backed by the OS serial port list
pub struct SystemEnumerator;

impl PortEnumerator for SystemEnumerator {
    fn enumerate(&self) -> Vec<PortCandidate> {
        let mut ports = tokio_serial::available_ports().unwrap_or_default();
        // The OS enumeration order is not stable; sort so auto-selection is
        // deterministic across runs
        ports.sort_by(|a, b| a.port_name.cmp(&b.port_name));

        ports
            .into_iter()
            .map(|info| {
                let description = match info.port_type {
                    tokio_serial::SerialPortType::UsbPort(usb) => usb
                        .product
                        .unwrap_or_else(|| "USB serial device".to_string()),
                    tokio_serial::SerialPortType::PciPort => "PCI serial port".to_string(),
                    tokio_serial::SerialPortType::BluetoothPort => {
                        "Bluetooth serial port".to_string()
                    }
                    tokio_serial::SerialPortType::Unknown => "serial port".to_string(),
                };
                PortCandidate {
                    path: info.port_name,
                    description,
                }
            })
            .collect()
    }

    fn probe(&self, path: &str) -> bool {
        // The baud rate is irrelevant for an open/close probe
        tokio_serial::new(path, 9600).open().is_ok()
    }
}

/// Serial device discovery over a pluggable enumerator
pub struct Discovery {
    config: DiscoveryConfig,
    enumerator: Box<dyn PortEnumerator>,
}

impl Discovery {
    /// Discovery over the OS serial port list
    pub fn new(config: DiscoveryConfig) -> Self {
        Self::with_enumerator(config, Box::new(SystemEnumerator))
    }

    /// Discovery over a custom enumerator (used by tests)
    pub fn with_enumerator(config: DiscoveryConfig, enumerator: Box<dyn PortEnumerator>) -> Self {
        Self { config, enumerator }
    }

    /// Enumerate, filter, and probe candidate devices.
    ///
    /// Returns openable candidates in the enumerator's order.
    pub fn discover(&self) -> Vec<PortCandidate> {
        let mut result = Vec::new();
        for candidate in self.enumerator.enumerate() {
            if self
                .config
                .ignore
                .iter()
                .any(|bad| candidate.path.contains(bad.as_str()))
            {
                debug!("Discovery: ignoring system port {}", candidate.path);
                continue;
            }

            if !self.config.allow.is_empty()
                && !self.config.allow.iter().any(|p| p == &candidate.path)
            {
                debug!("Discovery: {} not in allow list", candidate.path);
                continue;
            }

            if !self.enumerator.probe(&candidate.path) {
                debug!("Discovery: {} failed open probe", candidate.path);
                continue;
            }

            result.push(candidate);
        }
        result
    }
}

/// Auto-selection tie-break: prefer the first candidate whose path contains
/// a USB-indicating substring, otherwise take the first in order.
pub fn auto_select(candidates: &[PortCandidate]) -> Option<&PortCandidate> {
    candidates
        .iter()
        .find(|c| c.path.to_lowercase().contains("usb"))
        .or_else(|| candidates.first())
}
