//! # Telemetry Module
//!
//! Everything that happens to a frame after it leaves the serial link.
//!
//! This module handles:
//! - Splitting raw frames into fields and typing them
//! - Keeping the session's frame history and the latest readings
//! - Appending every frame to the CSV log
//! - Notifying frame consumers
//! - Rolling per-channel history for display

pub mod fanout;
pub mod frame;
pub mod logger;
pub mod series;
pub mod store;
