//! Trait abstraction for opening the telemetry port to enable testing

use tokio::io::AsyncRead;

use crate::error::Result;

/// Opens the byte stream a session reads frames from
pub trait PortConnector {
    /// Stream type handed to the frame reader
    type Port: AsyncRead + Unpin + Send + 'static;

    /// Open `path` at `baud_rate`
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be opened
    fn connect(&self, path: &str, baud_rate: u32) -> Result<Self::Port>;
}

/// Opens real serial ports through `tokio_serial`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSerialConnector;

impl PortConnector for TokioSerialConnector {
    type Port = tokio_serial::SerialStream;

    fn connect(&self, path: &str, baud_rate: u32) -> Result<Self::Port> {
        super::open_port(path, baud_rate)
    }
}
