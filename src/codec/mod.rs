//! # Line Codec Module
//!
//! Turns raw telemetry lines into typed events.
//!
//! This module handles:
//! - The `EULER` / `STATUS` / `TRANSPORT` line formats
//! - Validation (field counts, numeric parsing, finiteness)
//! - Classifying non-protocol lines as benign chatter or unknown content
//!
//! Parsing is pure: no I/O, no state, same input same result. The caller
//! (the event bus) owns the logging and counting policy for rejections.

pub mod event;
pub mod parser;

pub use event::{RawLine, Source, TelemetryEvent};
pub use parser::{parse, RejectReason};
