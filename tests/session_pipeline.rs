//! End-to-end ingestion tests: bytes on a pipe in, store, CSV log and
//! dashboard series out.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, DuplexStream};

use taternauts_gs::config::Config;
use taternauts_gs::dashboard::{Channel, ChannelPoints, Dashboard};
use taternauts_gs::error::{GroundStationError, Result};
use taternauts_gs::serial::PortConnector;
use taternauts_gs::session::{lock, Session, SessionSettings};
use taternauts_gs::telemetry::fanout::FrameConsumer;
use taternauts_gs::telemetry::store::TelemetryStore;

const GOOD_FRAME: &str = "1002,12.5,3,SW_OK,PL_ARM,305.2,21.4,7.8,1.1,-0.4,0.2,1001.3,POTATO";
const BAD_ALTITUDE: &str = "1002,,,,,notanumber,,,,,,,POTATO";
const HEADER_ROW: &str =
    "Team_Number,Time,PacketCount,SW_STATE,PL_STATE,Altitude,Temperature,Voltage,GYRO_R,GYRO_P,GYRO_Y,Pressure,POTATO";

/// Serves one end of an in-memory pipe as the serial port
struct PipeConnector {
    port: Mutex<Option<DuplexStream>>,
}

impl PipeConnector {
    fn new() -> (Self, DuplexStream) {
        let (device, host) = tokio::io::duplex(4096);
        (
            Self {
                port: Mutex::new(Some(host)),
            },
            device,
        )
    }
}

impl PortConnector for PipeConnector {
    type Port = DuplexStream;

    fn connect(&self, path: &str, _baud_rate: u32) -> Result<Self::Port> {
        self.port
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| GroundStationError::Serial(format!("{} already open", path)))
    }
}

fn frame(packet: u32, altitude: f64) -> String {
    format!(
        "1002,{}.0,{},SW_OK,PL_ARM,{},21.4,7.8,1.1,-0.4,0.2,1001.3,POTATO\r\n",
        packet, packet, altitude
    )
}

fn session_with_dashboard(log_file: &Path) -> (Session, Arc<Mutex<Dashboard>>) {
    let mut config = Config::default();
    config.telemetry.log_file = log_file.to_string_lossy().into_owned();

    let dashboard = Arc::new(Mutex::new(Dashboard::default()));
    let session = Session::new(SessionSettings::from_config(&config));
    let consumer = Arc::clone(&dashboard);
    session.on_frame(move |store: &TelemetryStore| lock(&consumer).on_frame(store));
    (session, dashboard)
}

fn log_rows(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect()
}

#[tokio::test]
async fn known_frame_reaches_store_and_every_plot() {
    let dir = TempDir::new().unwrap();
    let (mut session, dashboard) = session_with_dashboard(&dir.path().join("gs.csv"));
    let (connector, mut device) = PipeConnector::new();

    session
        .start_with(&connector, "/dev/ttyUSB0", 9600, Duration::from_secs(4))
        .unwrap();
    device.write_all(GOOD_FRAME.as_bytes()).await.unwrap();
    drop(device);
    session.stop().await.unwrap();

    session.with_store(|store| {
        assert_eq!(store.altitude(), Some(305.2));
        assert_eq!(store.temperature(), Some(21.4));
        assert_eq!(store.pressure(), Some(1001.3));
    });

    let dashboard = lock(&dashboard);
    for channel in Channel::ALL {
        assert_eq!(dashboard.channel_snapshot(channel).points.len(), 1, "{:?}", channel);
    }
    match dashboard.channel_snapshot(Channel::Rotation).points {
        ChannelPoints::Triaxial(points) => assert_eq!(points[0].value, [1.1, -0.4, 0.2]),
        other => panic!("Expected three-axis points, got: {:?}", other),
    }
}

#[tokio::test]
async fn malformed_altitude_adds_no_sample() {
    let dir = TempDir::new().unwrap();
    let (mut session, dashboard) = session_with_dashboard(&dir.path().join("gs.csv"));
    let (connector, mut device) = PipeConnector::new();

    session
        .start_with(&connector, "/dev/ttyUSB0", 9600, Duration::from_secs(4))
        .unwrap();
    device
        .write_all(format!("{}\r\n{}\r\n", GOOD_FRAME, BAD_ALTITUDE).as_bytes())
        .await
        .unwrap();
    drop(device);
    let stats = session.stop().await.unwrap();

    assert_eq!(stats.recorded, 2);
    session.with_store(|store| assert_eq!(store.altitude(), None));
    assert_eq!(lock(&dashboard).altitude().len(), 1);
}

#[tokio::test]
async fn n_frames_give_header_plus_n_rows() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("gs.csv");
    let (mut session, _dashboard) = session_with_dashboard(&log_path);
    let (connector, mut device) = PipeConnector::new();

    session
        .start_with(&connector, "/dev/ttyUSB0", 9600, Duration::from_secs(4))
        .unwrap();

    let sent: Vec<String> = (1..=5).map(|i| frame(i, 100.0 * i as f64)).collect();
    for line in &sent {
        device.write_all(line.as_bytes()).await.unwrap();
    }
    drop(device);
    session.stop().await.unwrap();

    let rows = log_rows(&log_path);
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0], HEADER_ROW);
    for (row, line) in rows[1..].iter().zip(&sent) {
        assert_eq!(row, line.trim());
    }
}

#[tokio::test]
async fn restarting_on_same_log_keeps_single_header() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("gs.csv");
    let (mut session, _dashboard) = session_with_dashboard(&log_path);

    for packet in 1..=2 {
        let (connector, mut device) = PipeConnector::new();
        session
            .start_with(&connector, "/dev/ttyUSB0", 9600, Duration::from_secs(4))
            .unwrap();
        device.write_all(frame(packet, 50.0).as_bytes()).await.unwrap();
        drop(device);
        session.stop().await.unwrap();
    }

    let rows = log_rows(&log_path);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|r| r.as_str() == HEADER_ROW).count(), 1);
    session.with_store(|store| assert_eq!(store.len(), 2));
}

#[tokio::test]
async fn plots_keep_only_the_last_twenty_samples() {
    let dir = TempDir::new().unwrap();
    let (mut session, dashboard) = session_with_dashboard(&dir.path().join("gs.csv"));
    let (connector, mut device) = PipeConnector::new();

    session
        .start_with(&connector, "/dev/ttyUSB0", 9600, Duration::from_secs(4))
        .unwrap();
    for i in 1..=25 {
        device.write_all(frame(i, i as f64).as_bytes()).await.unwrap();
    }
    drop(device);
    session.stop().await.unwrap();

    let dashboard = lock(&dashboard);
    let points = dashboard.altitude().snapshot();
    assert_eq!(points.len(), 20);
    assert_eq!(points[0].value, 6.0);
    assert_eq!(points[19].value, 25.0);
    assert!(points.windows(2).all(|p| p[0].elapsed <= p[1].elapsed));
    session.with_store(|store| assert_eq!(store.len(), 25));
}

#[tokio::test]
async fn frames_written_right_before_stop_are_logged() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("gs.csv");
    let (mut session, dashboard) = session_with_dashboard(&log_path);
    let (connector, mut device) = PipeConnector::new();

    session
        .start_with(&connector, "/dev/ttyUSB0", 9600, Duration::from_secs(4))
        .unwrap();
    device.write_all(frame(1, 10.0).as_bytes()).await.unwrap();
    device.write_all(frame(2, 20.0).as_bytes()).await.unwrap();
    let stats = session.stop().await.unwrap();

    assert_eq!(stats.recorded, 2);
    assert_eq!(log_rows(&log_path).len(), 3);
    assert_eq!(lock(&dashboard).altitude().len(), 2);
    drop(device);
}

#[tokio::test]
async fn stop_with_pending_read_finishes_within_timeout() {
    let dir = TempDir::new().unwrap();
    let (mut session, _dashboard) = session_with_dashboard(&dir.path().join("gs.csv"));
    let (connector, mut device) = PipeConnector::new();
    let read_timeout = Duration::from_secs(3);

    session
        .start_with(&connector, "/dev/ttyUSB0", 9600, read_timeout)
        .unwrap();
    device.write_all(frame(1, 10.0).as_bytes()).await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while session.with_store(|s| s.len()) < 1 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    device.write_all(b"1002,2.0,2,SW_OK").await.unwrap();

    let started = Instant::now();
    session.stop().await.unwrap();
    assert!(started.elapsed() < read_timeout);

    session.with_store(|store| {
        assert_eq!(store.len(), 1);
        assert_eq!(store.packet_count(), Some("1"));
    });
    drop(device);
}

#[tokio::test]
async fn missing_port_is_a_start_failure() {
    let mut session = Session::new(SessionSettings::default());
    let result = session.start(
        "/dev/taternauts_missing_port",
        9600,
        Duration::from_secs(1),
    );

    assert!(matches!(result, Err(GroundStationError::SessionStart { .. })));
    assert!(!session.is_running());
}
