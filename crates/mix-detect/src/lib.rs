//! Mixer Controller Detection Library
//!
//! This crate provides serial port enumeration, the transport used to open
//! ports, and a probe that recognizes a control surface by the lines it
//! streams.
//!
//! # Example
//!
//! ```rust,no_run
//! use mix_detect::{ControllerProber, SerialTransport};
//!
//! # async fn run() -> Result<(), mix_detect::DetectError> {
//! let transport = SerialTransport::new();
//! let found = ControllerProber::new().detect(&transport, 115200).await?;
//! println!("Controller on {}", found.port);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod probe;
pub mod scanner;
pub mod transport;

pub use error::DetectError;
pub use probe::{ControllerProber, DetectedPort, ProbeConfig};
pub use scanner::{PortKind, PortScanner, ScannerConfig, SerialPortInfo};
pub use transport::{AsyncStream, BoxedStream, SerialTransport, Transport};
