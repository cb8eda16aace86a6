//! # Taternauts Ground Station
//!
//! Headless telemetry viewer for the Taternauts balloon payload.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, or built-in defaults)
//!    - Set up logging with tracing subscriber
//!    - Register the dashboard as a frame consumer and open the serial port
//!
//! 2. **Main Loop**
//!    - Every render tick, print one JSON snapshot of the dashboard to stdout
//!    - Log the live readouts
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Graceful Shutdown**
//!    - Stop the session and wait for queued frames to be logged
//!    - Log session totals
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/ground-station.toml
//! ```
//!
//! Expected output on stderr:
//! ```text
//! INFO taternauts_gs: Taternauts GS v0.1.0 starting...
//! INFO taternauts_gs::serial: Port /dev/ttyUSB0 opened at 9600 baud
//! INFO taternauts_gs: Time Elapsed: 12.5 | Packet Count: 3 | SW_STATE: SW_OK | PL_STATE: PL_ARM
//! ```

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use taternauts_gs::config::{Config, LoggingConfig};
use taternauts_gs::dashboard::Dashboard;
use taternauts_gs::session::{lock, Session, SessionSettings};
use taternauts_gs::telemetry::fanout::FrameConsumer;
use taternauts_gs::telemetry::store::TelemetryStore;

/// Prefix of the daily rolling diagnostic log
const LOG_FILE_PREFIX: &str = "taternauts-gs.log";

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path))?,
        None => Config::default(),
    };

    let _log_guard = init_logging(&config.logging)?;

    info!("Taternauts GS v{} starting...", env!("CARGO_PKG_VERSION"));

    let dashboard = Arc::new(Mutex::new(Dashboard::new(config.display.window_size)));

    let mut session = Session::new(SessionSettings::from_config(&config));
    {
        let dashboard = Arc::clone(&dashboard);
        session.on_frame(move |store: &TelemetryStore| lock(&dashboard).on_frame(store));
    }

    session.start(
        &config.serial.port,
        config.serial.baud_rate,
        Duration::from_millis(config.serial.timeout_ms),
    )?;

    let store = session.store();
    let mut render = interval(Duration::from_millis(config.display.refresh_interval_ms));

    info!("Rendering every {} ms", config.display.refresh_interval_ms);
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = render.tick() => {
                // Store before dashboard, same order as the ingest task
                let snapshot = {
                    let store = lock(&store);
                    lock(&dashboard).snapshot(&store)
                };

                info!("{}", snapshot.readouts);
                println!("{}", serde_json::to_string(&snapshot)?);

                if !session.is_reading() {
                    warn!("Serial link closed, shutting down...");
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Some(stats) = session.stop().await {
        info!("Total frames recorded: {}", stats.recorded);
    }

    Ok(())
}

/// Install the stderr subscriber, plus a daily rolling file when configured
///
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level: tracing::Level = config
        .level
        .parse()
        .with_context(|| format!("invalid log level {}", config.level))?;
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let (file_layer, guard) = if config.dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            ),
            Some(guard),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_runnable() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.display.refresh_interval_ms, 1000);
    }

    #[test]
    fn test_init_logging_rejects_unknown_level() {
        let config = LoggingConfig {
            level: "verbose".to_string(),
            dir: String::new(),
        };

        match init_logging(&config) {
            Err(e) => assert!(e.to_string().contains("invalid log level verbose")),
            Ok(_) => panic!("Expected an unknown level to be rejected"),
        }
    }
}
