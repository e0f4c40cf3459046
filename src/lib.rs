//! # Gyro Relay Library
//!
//! Telemetry ingestion pipeline for an ESP32 orientation sensor.
//!
//! The sensor streams ASCII lines (`EULER`, `STATUS`, `TRANSPORT`) over a
//! serial link and/or UDP. This library owns both transports, parses the
//! lines into typed [`codec::TelemetryEvent`] values, and fans them out to
//! any number of subscribers via the [`bus::EventBus`]. Consumers such as a
//! web dashboard relay subscribe and handle their own delivery from there.

pub mod bus;
pub mod codec;
pub mod config;
pub mod error;
pub mod serial;
pub mod supervisor;
pub mod udp;
