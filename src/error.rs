//! # Error Types
//!
//! Custom error types for Gyro Relay using `thiserror`.

use thiserror::Error;

/// Main error type for Gyro Relay
#[derive(Debug, Error)]
pub enum GyroRelayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Invalid configuration values caught by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// UDP socket could not be bound; the channel is disabled, not retried
    #[error("Failed to bind UDP port {port}: {source}")]
    UdpBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Gyro Relay
pub type Result<T> = std::result::Result<T, GyroRelayError>;
