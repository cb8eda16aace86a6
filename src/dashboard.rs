//! # Dashboard
//!
//! Display state for the five telemetry plots and the live readouts.
//!
//! The dashboard is a frame consumer: on every recorded frame it pulls each
//! channel's value from the store and appends it to that channel's rolling
//! series. A channel whose value is absent on a frame gets no point for that
//! frame. Rotation only gets a point when all three gyro axes are present.
//!
//! Rendering is left to whoever calls [`Dashboard::snapshot`], which returns
//! a serializable copy of everything a plot needs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::telemetry::fanout::FrameConsumer;
use crate::telemetry::series::{RollingSeries, SeriesPoint};
use crate::telemetry::store::TelemetryStore;

/// Text shown when a readout has no value
pub const NOT_AVAILABLE: &str = "N/A";

/// Plotted telemetry channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Pressure,
    Temperature,
    Altitude,
    Rotation,
    Voltage,
}

/// Static display properties of a channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelDescriptor {
    pub title: &'static str,
    pub axis_label: &'static str,
    pub unit: &'static str,
    /// Fixed vertical range of the plot
    pub y_range: (f64, f64),
    /// One curve name per value component
    pub curves: &'static [&'static str],
}

impl Channel {
    /// Every channel, in plot grid order
    pub const ALL: [Channel; 5] = [
        Channel::Pressure,
        Channel::Temperature,
        Channel::Altitude,
        Channel::Rotation,
        Channel::Voltage,
    ];

    /// Display properties for this channel
    pub fn descriptor(self) -> ChannelDescriptor {
        match self {
            Channel::Pressure => ChannelDescriptor {
                title: "Pressure",
                axis_label: "Pressure",
                unit: "hPa",
                y_range: (0.0, 1100.0),
                curves: &["Pressure"],
            },
            Channel::Temperature => ChannelDescriptor {
                title: "Temperature",
                axis_label: "Temperature",
                unit: "°C",
                y_range: (0.0, 50.0),
                curves: &["Temperature"],
            },
            Channel::Altitude => ChannelDescriptor {
                title: "Altitude",
                axis_label: "Altitude",
                unit: "m",
                y_range: (0.0, 600.0),
                curves: &["Altitude"],
            },
            Channel::Rotation => ChannelDescriptor {
                title: "Rotation",
                axis_label: "Rotation",
                unit: "°",
                y_range: (-360.0, 360.0),
                curves: &["GYRO_R", "GYRO_P", "GYRO_Y"],
            },
            Channel::Voltage => ChannelDescriptor {
                title: "Voltage",
                axis_label: "Voltage",
                unit: "V",
                y_range: (0.0, 10.0),
                curves: &["Voltage"],
            },
        }
    }
}

/// Sidebar text readouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveReadouts {
    pub time: String,
    pub packet_count: String,
    pub software_state: String,
    pub payload_state: String,
}

impl Default for LiveReadouts {
    fn default() -> Self {
        Self {
            time: NOT_AVAILABLE.to_string(),
            packet_count: NOT_AVAILABLE.to_string(),
            software_state: NOT_AVAILABLE.to_string(),
            payload_state: NOT_AVAILABLE.to_string(),
        }
    }
}

impl LiveReadouts {
    /// Readouts for the store's latest frame; absent or empty fields read `N/A`
    pub fn from_store(store: &TelemetryStore) -> Self {
        let show = |value: Option<&str>| match value {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => NOT_AVAILABLE.to_string(),
        };

        Self {
            time: show(store.time()),
            packet_count: show(store.packet_count()),
            software_state: show(store.software_state()),
            payload_state: show(store.payload_state()),
        }
    }
}

impl std::fmt::Display for LiveReadouts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Time Elapsed: {} | Packet Count: {} | SW_STATE: {} | PL_STATE: {}",
            self.time, self.packet_count, self.software_state, self.payload_state
        )
    }
}

/// Points of one channel, scalar or three-axis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelPoints {
    Scalar(Vec<SeriesPoint<f64>>),
    Triaxial(Vec<SeriesPoint<[f64; 3]>>),
}

impl ChannelPoints {
    /// Number of points
    pub fn len(&self) -> usize {
        match self {
            ChannelPoints::Scalar(points) => points.len(),
            ChannelPoints::Triaxial(points) => points.len(),
        }
    }

    /// Whether there are no points
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Render-ready view of one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub channel: Channel,
    #[serde(flatten)]
    pub descriptor: ChannelDescriptor,
    /// Horizontal range to show, once two or more points exist
    pub x_range: Option<(f64, f64)>,
    pub points: ChannelPoints,
}

/// Render-ready view of the whole dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub received_at: Option<DateTime<Utc>>,
    pub frames: usize,
    pub readouts: LiveReadouts,
    pub channels: Vec<ChannelSnapshot>,
}

/// Rolling series for every plotted channel
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pressure: RollingSeries<f64>,
    temperature: RollingSeries<f64>,
    altitude: RollingSeries<f64>,
    rotation: RollingSeries<[f64; 3]>,
    voltage: RollingSeries<f64>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(crate::telemetry::series::DEFAULT_WINDOW)
    }
}

impl Dashboard {
    /// Create a dashboard whose series each keep `window` points
    pub fn new(window: usize) -> Self {
        Self {
            pressure: RollingSeries::new(window),
            temperature: RollingSeries::new(window),
            altitude: RollingSeries::new(window),
            rotation: RollingSeries::new(window),
            voltage: RollingSeries::new(window),
        }
    }

    /// Append the latest frame's values, stamped with its arrival time
    ///
    /// Does nothing if the store is empty.
    pub fn update(&mut self, store: &TelemetryStore) {
        if let Some(received_at) = store.received_at() {
            self.update_at(store, received_at);
        }
    }

    /// Append the latest frame's values at an explicit timestamp
    pub fn update_at(&mut self, store: &TelemetryStore, timestamp: DateTime<Utc>) {
        if let Some(pressure) = store.pressure() {
            self.pressure.append(pressure, timestamp);
        }
        if let Some(temperature) = store.temperature() {
            self.temperature.append(temperature, timestamp);
        }
        if let Some(altitude) = store.altitude() {
            self.altitude.append(altitude, timestamp);
        }
        if let Some(rotation) = store.rotation() {
            self.rotation.append(rotation, timestamp);
        }
        if let Some(voltage) = store.voltage() {
            self.voltage.append(voltage, timestamp);
        }
    }

    /// Clear one channel's points and time anchor
    pub fn reset(&mut self, channel: Channel) {
        match channel {
            Channel::Pressure => self.pressure.reset(),
            Channel::Temperature => self.temperature.reset(),
            Channel::Altitude => self.altitude.reset(),
            Channel::Rotation => self.rotation.reset(),
            Channel::Voltage => self.voltage.reset(),
        }
    }

    /// Clear every channel
    pub fn reset_all(&mut self) {
        for channel in Channel::ALL {
            self.reset(channel);
        }
    }

    pub fn pressure(&self) -> &RollingSeries<f64> {
        &self.pressure
    }

    pub fn temperature(&self) -> &RollingSeries<f64> {
        &self.temperature
    }

    pub fn altitude(&self) -> &RollingSeries<f64> {
        &self.altitude
    }

    pub fn rotation(&self) -> &RollingSeries<[f64; 3]> {
        &self.rotation
    }

    pub fn voltage(&self) -> &RollingSeries<f64> {
        &self.voltage
    }

    /// Render-ready copy of one channel
    pub fn channel_snapshot(&self, channel: Channel) -> ChannelSnapshot {
        let (x_range, points) = match channel {
            Channel::Pressure => scalar(&self.pressure),
            Channel::Temperature => scalar(&self.temperature),
            Channel::Altitude => scalar(&self.altitude),
            Channel::Voltage => scalar(&self.voltage),
            Channel::Rotation => (
                self.rotation.x_range(),
                ChannelPoints::Triaxial(self.rotation.snapshot()),
            ),
        };

        ChannelSnapshot {
            channel,
            descriptor: channel.descriptor(),
            x_range,
            points,
        }
    }

    /// Render-ready copy of every channel plus the store's readouts
    pub fn snapshot(&self, store: &TelemetryStore) -> DashboardSnapshot {
        DashboardSnapshot {
            received_at: store.received_at(),
            frames: store.len(),
            readouts: LiveReadouts::from_store(store),
            channels: Channel::ALL
                .iter()
                .map(|&channel| self.channel_snapshot(channel))
                .collect(),
        }
    }
}

fn scalar(series: &RollingSeries<f64>) -> (Option<(f64, f64)>, ChannelPoints) {
    (series.x_range(), ChannelPoints::Scalar(series.snapshot()))
}

impl FrameConsumer for Dashboard {
    fn on_frame(&mut self, store: &TelemetryStore) {
        self.update(store);
    }
}
