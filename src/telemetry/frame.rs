//! # Telemetry Frame
//!
//! Splits raw frames into fields and lifts them into a typed record.
//!
//! ## Frame Layout
//!
//! | Index | Field | Type |
//! |-------|-------|------|
//! | 0 | Team number | text |
//! | 1 | Mission time | text |
//! | 2 | Packet count | text |
//! | 3 | Software state | text |
//! | 4 | Payload state | text |
//! | 5 | Altitude (m) | number |
//! | 6 | Temperature (°C) | number |
//! | 7 | Voltage (V) | number |
//! | 8 | Gyro roll (°) | number |
//! | 9 | Gyro pitch (°) | number |
//! | 10 | Gyro yaw (°) | number |
//! | 11 | Pressure | number |
//! | 12 | Sentinel marker | text |

use serde::Serialize;

/// Byte sequence terminating every frame on the serial link
pub const FRAME_SENTINEL: &str = "POTATO";

/// Field delimiter inside a frame
pub const FIELD_DELIMITER: char = ',';

/// Column header of the persisted telemetry log
pub const LOG_HEADER: [&str; 13] = [
    "Team_Number",
    "Time",
    "PacketCount",
    "SW_STATE",
    "PL_STATE",
    "Altitude",
    "Temperature",
    "Voltage",
    "GYRO_R",
    "GYRO_P",
    "GYRO_Y",
    "Pressure",
    "POTATO",
];

/// Team number field index
pub const IDX_TEAM_NUMBER: usize = 0;
/// Mission time field index
pub const IDX_TIME: usize = 1;
/// Packet count field index
pub const IDX_PACKET_COUNT: usize = 2;
/// Software state field index
pub const IDX_SW_STATE: usize = 3;
/// Payload state field index
pub const IDX_PL_STATE: usize = 4;
/// Altitude field index
pub const IDX_ALTITUDE: usize = 5;
/// Temperature field index
pub const IDX_TEMPERATURE: usize = 6;
/// Voltage field index
pub const IDX_VOLTAGE: usize = 7;
/// Gyro roll field index
pub const IDX_GYRO_ROLL: usize = 8;
/// Gyro pitch field index
pub const IDX_GYRO_PITCH: usize = 9;
/// Gyro yaw field index
pub const IDX_GYRO_YAW: usize = 10;
/// Pressure field index
pub const IDX_PRESSURE: usize = 11;

/// Split a raw frame into its ordered fields
///
/// No trimming or validation happens here. An empty frame yields a single
/// empty field, mirroring how `str::split` treats it.
///
/// # Examples
///
/// ```
/// use taternauts_gs::telemetry::frame::parse_fields;
///
/// assert_eq!(parse_fields("1002,12.5,3"), vec!["1002", "12.5", "3"]);
/// assert_eq!(parse_fields(""), vec![""]);
/// ```
pub fn parse_fields(raw: &str) -> Vec<String> {
    raw.split(FIELD_DELIMITER).map(str::to_string).collect()
}

/// One frame with every position interpreted once
///
/// Text fields keep their raw value (possibly empty). Numeric fields are
/// `None` when the column is missing or does not hold a finite number.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetryFrame {
    pub team_number: Option<String>,
    pub time: Option<String>,
    pub packet_count: Option<String>,
    pub software_state: Option<String>,
    pub payload_state: Option<String>,
    pub altitude: Option<f64>,
    pub temperature: Option<f64>,
    pub voltage: Option<f64>,
    pub gyro_roll: Option<f64>,
    pub gyro_pitch: Option<f64>,
    pub gyro_yaw: Option<f64>,
    pub pressure: Option<f64>,
}

impl TelemetryFrame {
    /// Build the typed record from split fields
    ///
    /// Never fails: short or malformed frames just leave fields absent.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Self {
        let text = |idx: usize| fields.get(idx).map(|f| f.as_ref().to_string());
        let number = |idx: usize| fields.get(idx).and_then(|f| parse_number(f.as_ref()));

        Self {
            team_number: text(IDX_TEAM_NUMBER),
            time: text(IDX_TIME),
            packet_count: text(IDX_PACKET_COUNT),
            software_state: text(IDX_SW_STATE),
            payload_state: text(IDX_PL_STATE),
            altitude: number(IDX_ALTITUDE),
            temperature: number(IDX_TEMPERATURE),
            voltage: number(IDX_VOLTAGE),
            gyro_roll: number(IDX_GYRO_ROLL),
            gyro_pitch: number(IDX_GYRO_PITCH),
            gyro_yaw: number(IDX_GYRO_YAW),
            pressure: number(IDX_PRESSURE),
        }
    }

    /// All three gyro axes, only when every axis is present
    pub fn rotation(&self) -> Option<[f64; 3]> {
        Some([self.gyro_roll?, self.gyro_pitch?, self.gyro_yaw?])
    }
}

/// Parse a numeric field, tolerating surrounding whitespace
fn parse_number(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
