//! # Taternauts Ground Station Library
//!
//! Telemetry ingestion for the Taternauts balloon payload.
//!
//! This library reads `POTATO`-terminated CSV frames from the payload radio,
//! keeps the session's frame history, logs every frame to disk and feeds
//! rolling per-channel series for display.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod serial;
pub mod session;
pub mod telemetry;
