//! # Telemetry Logger
//!
//! Appends every received frame to a CSV log.
//!
//! The header row is written only when the file is new or empty, so
//! starting several sessions against the same file never interleaves
//! header rows with data. Each row is flushed as soon as it is written.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::frame::LOG_HEADER;
use crate::error::{GroundStationError, Result};

/// Append-only CSV sink for raw frames
pub struct TelemetryLogger {
    writer: csv::Writer<Box<dyn Write + Send>>,
    path: Option<PathBuf>,
    rows_written: u64,
}

impl std::fmt::Debug for TelemetryLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryLogger")
            .field("path", &self.path)
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

impl TelemetryLogger {
    /// Open (or create) the log file for appending
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the file cannot be opened or the header
    /// cannot be written.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use taternauts_gs::telemetry::logger::TelemetryLogger;
    ///
    /// let mut logger = TelemetryLogger::open("taternauts.csv")?;
    /// logger.append(&["1002".to_string(), "1.0".to_string()])?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(GroundStationError::Persistence)?;

        let is_empty = file
            .metadata()
            .map_err(GroundStationError::Persistence)?
            .len()
            == 0;

        let mut logger = Self::from_writer(file, is_empty)?;
        if is_empty {
            info!("Created telemetry log at {}", path.display());
        } else {
            info!("Appending to existing telemetry log at {}", path.display());
        }
        logger.path = Some(path);

        Ok(logger)
    }

    /// Log to an arbitrary byte sink
    ///
    /// The header row is written first when `write_header` is set.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the header cannot be written.
    pub fn from_writer<W: Write + Send + 'static>(writer: W, write_header: bool) -> Result<Self> {
        // Frames do not all carry the same number of fields
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(Box::new(writer) as Box<dyn Write + Send>);

        let mut logger = Self {
            writer,
            path: None,
            rows_written: 0,
        };
        if write_header {
            logger.write_row(&LOG_HEADER)?;
        }
        Ok(logger)
    }

    /// Append one frame's fields as a row
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the row cannot be written or flushed.
    pub fn append<S: AsRef<[u8]>>(&mut self, fields: &[S]) -> Result<()> {
        self.write_row(fields)?;
        self.rows_written += 1;
        debug!("Logged frame row {} ({} fields)", self.rows_written, fields.len());
        Ok(())
    }

    /// Path of the log file, if it was opened from one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Data rows appended through this logger
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn write_row<S: AsRef<[u8]>>(&mut self, fields: &[S]) -> Result<()> {
        self.writer
            .write_record(fields)
            .map_err(|e| GroundStationError::Persistence(e.into()))?;
        self.writer.flush().map_err(GroundStationError::Persistence)?;
        Ok(())
    }
}
