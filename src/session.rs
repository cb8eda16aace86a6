//! # Telemetry Session
//!
//! Runs the ingestion pipeline for one open serial port.
//!
//! A session is two tasks joined by a bounded channel:
//!
//! 1. **Reader** owns the port. It reads sentinel-terminated frames, stamps
//!    them with their arrival time and queues them. It watches the stop
//!    signal while waiting. On stop it still queues every complete frame
//!    the port can hand over without waiting, then drops any partial one.
//! 2. **Ingest** drains the queue in order. Each frame is split, recorded
//!    in the store, appended to the CSV log and then handed to every frame
//!    consumer, synchronously.
//!
//! A full queue pauses the reader, so a stuck consumer stalls the whole
//! pipeline rather than dropping frames.
//!
//! Lock order is store, then fan-out (and whatever consumers lock). Code
//! that needs the store together with consumer state must lock the store
//! first.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{GroundStationError, Result};
use crate::serial::{FrameReader, PortConnector, ReadOutcome, TokioSerialConnector};
use crate::telemetry::fanout::{Fanout, FrameConsumer};
use crate::telemetry::frame::{parse_fields, IDX_TEAM_NUMBER};
use crate::telemetry::logger::TelemetryLogger;
use crate::telemetry::store::TelemetryStore;

/// Default depth of the reader to ingest queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Lock a shared value, recovering the data if a holder panicked
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-session ingestion settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// CSV log to append to, or `None` to skip persistence
    pub log_file: Option<PathBuf>,
    /// Only frames from this team are ingested
    pub team_filter: Option<String>,
    /// Frames that may wait between reader and ingest
    pub queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            log_file: None,
            team_filter: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl SessionSettings {
    /// Settings taken from the `[telemetry]` section
    pub fn from_config(config: &Config) -> Self {
        Self {
            log_file: config
                .telemetry
                .persist
                .then(|| PathBuf::from(&config.telemetry.log_file)),
            team_filter: config.team_filter().map(str::to_string),
            queue_capacity: config.telemetry.queue_capacity.max(1),
        }
    }
}

/// Counters reported when a session stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames recorded in the store
    pub recorded: u64,
    /// Frames skipped by the team filter
    pub filtered: u64,
    /// Rows appended to the CSV log
    pub persisted: u64,
}

/// A frame as it left the reader
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawFrame {
    line: String,
    received_at: DateTime<Utc>,
}

struct Running {
    port: String,
    stop_tx: watch::Sender<bool>,
    reader: JoinHandle<()>,
    ingest: JoinHandle<SessionStats>,
}

/// Start/stop control over telemetry ingestion
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use taternauts_gs::session::{Session, SessionSettings};
/// use taternauts_gs::telemetry::store::TelemetryStore;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut session = Session::new(SessionSettings::default());
///     session.on_frame(|store: &TelemetryStore| {
///         println!("altitude: {:?}", store.altitude());
///     });
///
///     session.start("/dev/ttyUSB0", 9600, Duration::from_secs(4))?;
///     tokio::time::sleep(Duration::from_secs(10)).await;
///     session.stop().await;
///     Ok(())
/// }
/// ```
pub struct Session {
    settings: SessionSettings,
    store: Arc<Mutex<TelemetryStore>>,
    fanout: Arc<Mutex<Fanout>>,
    running: Option<Running>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.settings)
            .field("port", &self.running.as_ref().map(|r| r.port.as_str()))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a stopped session with an empty store
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            store: Arc::new(Mutex::new(TelemetryStore::new())),
            fanout: Arc::new(Mutex::new(Fanout::new())),
            running: None,
        }
    }

    /// Register a consumer notified after every recorded frame
    ///
    /// Consumers run in registration order and may be added while the
    /// session is running.
    pub fn on_frame<C: FrameConsumer + 'static>(&self, consumer: C) {
        lock(&self.fanout).register(consumer);
    }

    /// Shared handle to the frame store
    pub fn store(&self) -> Arc<Mutex<TelemetryStore>> {
        Arc::clone(&self.store)
    }

    /// Run `f` against the store
    pub fn with_store<R>(&self, f: impl FnOnce(&TelemetryStore) -> R) -> R {
        f(&lock(&self.store))
    }

    /// Whether a session was started and not yet stopped
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Whether the reader is still pulling from the port
    ///
    /// Turns false when the port reports end of stream, even before
    /// [`Session::stop`] is called.
    pub fn is_reading(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.reader.is_finished())
    }

    /// Open a serial port and start ingesting
    ///
    /// # Errors
    ///
    /// - `SessionAlreadyRunning` if a session is active
    /// - `SessionStart` if the port cannot be opened
    pub fn start(&mut self, port: &str, baud_rate: u32, timeout: Duration) -> Result<()> {
        self.start_with(&TokioSerialConnector, port, baud_rate, timeout)
    }

    /// Start ingesting from a port opened by `connector`
    ///
    /// Must be called from within a tokio runtime. A CSV log that cannot be
    /// opened is reported and the session runs without persistence.
    ///
    /// # Errors
    ///
    /// - `SessionAlreadyRunning` if a session is active
    /// - `SessionStart` if the connector fails
    pub fn start_with<C: PortConnector>(
        &mut self,
        connector: &C,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<()> {
        if self.running.is_some() {
            return Err(GroundStationError::SessionAlreadyRunning);
        }

        let stream = connector
            .connect(port, baud_rate)
            .map_err(|e| GroundStationError::SessionStart {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        let logger = self.settings.log_file.as_ref().and_then(|path| {
            TelemetryLogger::open(path)
                .map_err(|e| warn!("Telemetry log unavailable, continuing without it: {}", e))
                .ok()
        });

        self.launch(stream, logger, port, baud_rate, timeout);
        Ok(())
    }

    /// Spawn the reader and ingest tasks over an open port
    fn launch<R: AsyncRead + Unpin + Send + 'static>(
        &mut self,
        stream: R,
        logger: Option<TelemetryLogger>,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) {
        let (frame_tx, frame_rx) = mpsc::channel(self.settings.queue_capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);

        let reader = tokio::spawn(run_reader(
            FrameReader::new(stream, timeout),
            frame_tx,
            stop_rx,
        ));

        let ingest = tokio::spawn(run_ingest(
            frame_rx,
            Ingest {
                store: Arc::clone(&self.store),
                fanout: Arc::clone(&self.fanout),
                logger,
                team_filter: self.settings.team_filter.clone(),
                stats: SessionStats::default(),
            },
        ));

        info!("Session started on {} ({} baud, {:?} timeout)", port, baud_rate, timeout);
        self.running = Some(Running {
            port: port.to_string(),
            stop_tx,
            reader,
            ingest,
        });
    }

    /// Stop reading and wait for queued frames to be ingested
    ///
    /// Returns `None` if no session was running. The port is released once
    /// this returns.
    pub async fn stop(&mut self) -> Option<SessionStats> {
        let running = self.running.take()?;
        let _ = running.stop_tx.send(true);

        if let Err(e) = running.reader.await {
            warn!("Reader task ended abnormally: {}", e);
        }

        let stats = match running.ingest.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Ingest task ended abnormally: {}", e);
                SessionStats::default()
            }
        };

        info!(
            "Session on {} stopped: {} frames recorded, {} filtered, {} logged",
            running.port, stats.recorded, stats.filtered, stats.persisted
        );
        Some(stats)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            let _ = running.stop_tx.send(true);
        }
    }
}

/// Producer loop: port to queue
///
/// On stop, frames that are already buffered or readable without waiting
/// are still queued. Only a trailing partial frame is dropped.
async fn run_reader<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    frames: mpsc::Sender<RawFrame>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let outcome = tokio::select! {
            biased;
            _ = stop.changed() => {
                drain_ready(&mut reader, &frames).await;
                break;
            }
            outcome = reader.read_frame() => outcome,
        };

        match outcome {
            Ok(ReadOutcome::Frame(line)) => {
                if !forward(&frames, line).await {
                    break;
                }
            }
            Ok(ReadOutcome::Empty) => {}
            Ok(ReadOutcome::Closed) => {
                warn!("Serial port closed, reader stopping");
                break;
            }
            Err(e) => report_read_error(&e),
        }
    }
    debug!("Reader loop exited");
}

/// Queue every complete frame the port can hand over right now
async fn drain_ready<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    frames: &mpsc::Sender<RawFrame>,
) {
    loop {
        match reader.read_ready_frame().await {
            Ok(Some(line)) => {
                if !forward(frames, line).await {
                    return;
                }
            }
            Ok(None) => break,
            Err(e @ GroundStationError::Decode(_)) => report_read_error(&e),
            Err(e) => {
                warn!("Read failed while draining, giving up: {}", e);
                break;
            }
        }
    }

    if reader.buffered() > 0 {
        debug!("Discarding {} bytes of unterminated frame", reader.buffered());
    }
}

/// Stamp and queue one frame. False once ingest has gone away.
async fn forward(frames: &mpsc::Sender<RawFrame>, line: String) -> bool {
    debug!("Received: {}", line);
    let raw = RawFrame {
        line,
        received_at: Utc::now(),
    };
    frames.send(raw).await.is_ok()
}

fn report_read_error(error: &GroundStationError) {
    match error {
        GroundStationError::Serial(_) => warn!("Transport error, retrying read: {}", error),
        GroundStationError::Decode(_) => warn!("Dropping frame that is not valid UTF-8: {}", error),
        _ => warn!("Read failed: {}", error),
    }
}

/// Consumer loop: queue to store, log and consumers
async fn run_ingest(mut frames: mpsc::Receiver<RawFrame>, mut ingest: Ingest) -> SessionStats {
    while let Some(raw) = frames.recv().await {
        ingest.process(raw);
    }
    ingest.stats
}

struct Ingest {
    store: Arc<Mutex<TelemetryStore>>,
    fanout: Arc<Mutex<Fanout>>,
    logger: Option<TelemetryLogger>,
    team_filter: Option<String>,
    stats: SessionStats,
}

impl Ingest {
    fn process(&mut self, raw: RawFrame) {
        let fields = parse_fields(&raw.line);

        if let Some(team) = &self.team_filter {
            if fields.get(IDX_TEAM_NUMBER).map(String::as_str) != Some(team.as_str()) {
                debug!("Skipping frame from another team: {}", raw.line);
                self.stats.filtered += 1;
                return;
            }
        }

        let mut store = lock(&self.store);
        let fields = &store.record_at(fields, raw.received_at).fields;
        self.stats.recorded += 1;

        if let Some(logger) = self.logger.as_mut() {
            match logger.append(fields) {
                Ok(()) => self.stats.persisted += 1,
                Err(e) => {
                    warn!("Telemetry log write failed, persistence disabled for this session: {}", e);
                    self.logger = None;
                }
            }
        }

        lock(&self.fanout).notify(&store);
    }
}
