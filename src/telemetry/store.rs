//! # Telemetry Store
//!
//! Append-only log of every frame received in this session.
//!
//! The latest frame backs the typed accessors. History is never evicted;
//! the rolling series in [`crate::telemetry::series`] are the only bounded
//! structures.

use chrono::{DateTime, Utc};

use super::frame::TelemetryFrame;

/// A frame as it was recorded: raw fields, typed view and arrival time
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    /// Comma-split fields exactly as received
    pub fields: Vec<String>,
    /// Typed interpretation of `fields`
    pub frame: TelemetryFrame,
    /// When the frame came off the serial link
    pub received_at: DateTime<Utc>,
}

/// In-memory frame log
#[derive(Debug, Default)]
pub struct TelemetryStore {
    frames: Vec<RecordedFrame>,
}

impl TelemetryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame received now
    pub fn record(&mut self, fields: Vec<String>) -> &RecordedFrame {
        self.record_at(fields, Utc::now())
    }

    /// Record a frame with an explicit arrival time and mark it latest
    pub fn record_at(&mut self, fields: Vec<String>, received_at: DateTime<Utc>) -> &RecordedFrame {
        let frame = TelemetryFrame::from_fields(&fields);
        self.frames.push(RecordedFrame {
            fields,
            frame,
            received_at,
        });
        &self.frames[self.frames.len() - 1]
    }

    /// Raw fields of the most recent frame
    pub fn latest(&self) -> Option<&[String]> {
        self.frames.last().map(|r| r.fields.as_slice())
    }

    /// The most recent recorded frame
    pub fn latest_record(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    /// Every frame recorded so far, oldest first
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    /// Number of recorded frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Arrival time of the latest frame
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.frames.last().map(|r| r.received_at)
    }

    fn latest_frame(&self) -> Option<&TelemetryFrame> {
        self.frames.last().map(|r| &r.frame)
    }

    pub fn team_number(&self) -> Option<&str> {
        self.latest_frame()?.team_number.as_deref()
    }

    pub fn time(&self) -> Option<&str> {
        self.latest_frame()?.time.as_deref()
    }

    pub fn packet_count(&self) -> Option<&str> {
        self.latest_frame()?.packet_count.as_deref()
    }

    pub fn software_state(&self) -> Option<&str> {
        self.latest_frame()?.software_state.as_deref()
    }

    pub fn payload_state(&self) -> Option<&str> {
        self.latest_frame()?.payload_state.as_deref()
    }

    pub fn altitude(&self) -> Option<f64> {
        self.latest_frame()?.altitude
    }

    pub fn temperature(&self) -> Option<f64> {
        self.latest_frame()?.temperature
    }

    pub fn voltage(&self) -> Option<f64> {
        self.latest_frame()?.voltage
    }

    pub fn gyro_roll(&self) -> Option<f64> {
        self.latest_frame()?.gyro_roll
    }

    pub fn gyro_pitch(&self) -> Option<f64> {
        self.latest_frame()?.gyro_pitch
    }

    pub fn gyro_yaw(&self) -> Option<f64> {
        self.latest_frame()?.gyro_yaw
    }

    pub fn pressure(&self) -> Option<f64> {
        self.latest_frame()?.pressure
    }

    /// Roll, pitch and yaw together, only if all three are present
    pub fn rotation(&self) -> Option<[f64; 3]> {
        self.latest_frame()?.rotation()
    }
}
