//! Error types for session routing

use mix_protocol::ConsumerError;
use thiserror::Error;

/// Errors reported by a session or session finder
#[derive(Debug, Error)]
pub enum SessionError {
    /// The handle was released or its process went away
    #[error("session {0} is no longer available")]
    Gone(String),

    /// The platform rejected the operation
    #[error("session operation failed: {0}")]
    Failed(String),
}

/// Errors reported by the platform audio services
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The requested device already is the default; not a failure
    #[error("device is already active")]
    AlreadyActive,

    /// No device matches the requested name
    #[error("no audio device named {0:?}")]
    DeviceNotFound(String),

    /// The platform has no such concept (e.g. no foreground window)
    #[error("not supported on this platform")]
    Unsupported,

    #[error("platform call failed: {0}")]
    Failed(String),
}

/// Errors returned by event routing
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Enumerating sessions failed
    #[error("failed to get audio sessions: {0}")]
    Enumeration(#[from] SessionError),

    /// Releasing the session finder failed
    #[error("failed to release session finder: {0}")]
    Release(#[source] SessionError),

    /// No device is configured for this index
    #[error("unknown output device index {0}")]
    UnknownOutputDevice(i32),

    /// More than one device name is configured for this index
    #[error("output device index {index} maps to {count} devices")]
    AmbiguousOutputDevice { index: i32, count: usize },
}

impl From<RoutingError> for ConsumerError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::UnknownOutputDevice(index) => ConsumerError::UnknownOutputDevice(index),
            RoutingError::AmbiguousOutputDevice { index, count } => {
                ConsumerError::AmbiguousOutputDevice { index, count }
            }
            other => ConsumerError::Failed(other.to_string()),
        }
    }
}
