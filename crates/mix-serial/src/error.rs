//! Error types for the serial protocol engine

use std::io;

use mix_detect::DetectError;
use thiserror::Error;

/// Errors that can occur while running the serial engine
#[derive(Debug, Error)]
pub enum SerialError {
    /// Port is `"auto"` and no candidate answered like a controller
    #[error("serial auto-detect failed: {0}")]
    AutoDetectFailed(#[source] DetectError),

    /// The first connection attempt after start failed
    #[error("failed to connect to {port}: {source}")]
    InitialConnectFailed {
        port: String,
        #[source]
        source: io::Error,
    },

    /// `start` was called on a running engine
    #[error("serial engine already started")]
    AlreadyStarted,

    /// Opening a port failed during a reconnect
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },

    /// Detection failed during a reconnect
    #[error("detection failed: {0}")]
    Detect(#[from] DetectError),
}

impl SerialError {
    /// Whether this error aborts startup and warrants telling the user
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::AutoDetectFailed(_) | Self::InitialConnectFailed { .. }
        )
    }
}
