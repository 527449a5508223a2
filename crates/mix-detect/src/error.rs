//! Error types for controller detection

use thiserror::Error;

/// Errors that can occur during detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    Enumeration(#[from] serialport::Error),

    /// None of the candidate ports streamed valid controller lines
    #[error("no controller found on {tried} candidate port(s)")]
    NoControllerFound { tried: usize },
}
