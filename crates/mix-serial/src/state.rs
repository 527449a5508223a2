//! Connection state

use std::fmt;

/// Where the engine is in its connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Created, not started
    #[default]
    Unconfigured,
    /// Probing candidate ports for a controller
    Detecting,
    /// Opening the port
    Connecting,
    /// Reading lines
    Connected,
    /// Lost the port, retrying
    Disconnected,
    /// Stopped explicitly or startup failed
    Stopped,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Detecting => "detecting",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
