//! Serial port scanner
//!
//! Produces the list of ports worth probing for a controller.

use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DetectError;

/// First and last COM port number probed on Windows
const WINDOWS_COM_RANGE: std::ops::RangeInclusive<u8> = 3..=16;

/// Kind of serial port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Usb { vid: u16, pid: u16 },
    Bluetooth,
    Pci,
    Unknown,
}

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    pub kind: PortKind,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        let (kind, product) = match port_type {
            SerialPortType::UsbPort(usb) => (
                PortKind::Usb {
                    vid: usb.vid,
                    pid: usb.pid,
                },
                usb.product.clone(),
            ),
            SerialPortType::BluetoothPort => (PortKind::Bluetooth, None),
            SerialPortType::PciPort => (PortKind::Pci, None),
            SerialPortType::Unknown => (PortKind::Unknown, None),
        };
        Self {
            port: name,
            kind,
            product,
        }
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports whose name contains one of these patterns
    pub skip_patterns: Vec<String>,
    /// Probe exactly these ports instead of enumerating
    pub pinned_candidates: Option<Vec<String>>,
}

/// Serial port scanner
#[derive(Debug, Clone)]
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                skip_patterns: vec![
                    // Bluetooth ports on macOS
                    "Bluetooth".to_string(),
                    // Debug/logging ports
                    "debug".to_string(),
                ],
                pinned_candidates: None,
            },
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate the system's serial ports, minus skipped ones
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        let ports = available_ports()?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip(p))
            .collect();

        info!("Found {} serial port(s)", result.len());
        for port in &result {
            debug!(
                "  {} - {}",
                port.port,
                port.product.as_deref().unwrap_or("Unknown")
            );
        }

        Ok(result)
    }

    /// Ports to probe during auto-detection, in probe order
    ///
    /// Windows gets the fixed `COM3..=COM16` range since enumeration there
    /// misses some USB-serial drivers.
    pub fn candidate_ports(&self) -> Result<Vec<String>, DetectError> {
        if let Some(pinned) = &self.config.pinned_candidates {
            return Ok(pinned.clone());
        }

        if cfg!(windows) {
            return Ok(windows_candidates());
        }

        Ok(self
            .enumerate_ports()?
            .into_iter()
            .map(|p| p.port)
            .collect())
    }

    /// Bluetooth links never carry a wired controller
    fn should_skip(&self, info: &SerialPortInfo) -> bool {
        info.kind == PortKind::Bluetooth || self.should_skip_port(&info.port)
    }

    fn should_skip_port(&self, name: &str) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| name.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn windows_candidates() -> Vec<String> {
    WINDOWS_COM_RANGE.map(|n| format!("COM{}", n)).collect()
}
