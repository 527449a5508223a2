//! Port transport
//!
//! The engine and the prober never touch `tokio-serial` directly; they go
//! through [`Transport`] so simulated controllers can stand in for hardware.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::debug;

use crate::error::DetectError;
use crate::scanner::PortScanner;

/// Byte stream to a controller
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Owned, type-erased controller stream
pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens controller streams by port name
pub trait Transport: Send + Sync {
    /// Ports to probe during auto-detection, in order
    fn candidate_ports(&self) -> Result<Vec<String>, DetectError>;

    /// Open `port` at `baud_rate`, 8 data bits, 1 stop bit, no flow control
    fn open(&self, port: &str, baud_rate: u32) -> io::Result<BoxedStream>;
}

/// Real serial ports through `tokio-serial`
#[derive(Debug, Clone, Default)]
pub struct SerialTransport {
    scanner: PortScanner,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom scanner for candidate ports
    pub fn with_scanner(scanner: PortScanner) -> Self {
        Self { scanner }
    }
}

impl Transport for SerialTransport {
    fn candidate_ports(&self) -> Result<Vec<String>, DetectError> {
        self.scanner.candidate_ports()
    }

    fn open(&self, port: &str, baud_rate: u32) -> io::Result<BoxedStream> {
        debug!("Opening {} at {} baud", port, baud_rate);

        let stream = tokio_serial::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(io::Error::from)?;

        Ok(Box::new(stream))
    }
}
