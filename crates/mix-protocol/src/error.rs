//! Error types for control surface protocol parsing

use thiserror::Error;

/// Errors that can occur while parsing a wire line
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line was empty after trimming
    #[error("empty line")]
    EmptyLine,

    /// Line does not match the `command|data|...` grammar
    #[error("invalid line: {0}")]
    InvalidLine(String),
}

/// Errors a button/device consumer can report back to the protocol engine
///
/// Any of these turns into an `ERROR` reply on the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsumerError {
    /// No output device is configured for the requested index
    #[error("unknown output device index {0}")]
    UnknownOutputDevice(i32),

    /// More than one device name is configured for the requested index
    #[error("output device index {index} maps to {count} devices, switching to a group is unsupported")]
    AmbiguousOutputDevice { index: i32, count: usize },

    /// The consumer failed for a backend-specific reason
    #[error("consumer failed: {0}")]
    Failed(String),
}
