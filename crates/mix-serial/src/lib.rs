//! Mixer Serial Protocol Engine
//!
//! Connects to a control surface over a [`mix_detect::Transport`], turns its
//! lines into typed events and writes the replies back.
//!
//! # Lifecycle
//!
//! ```text
//! Unconfigured -> [Detecting] -> Connecting -> Connected
//!                                    ^            |
//!                                    |            v
//!                                    +----- Disconnected
//!
//! any state -> Stopped
//! ```
//!
//! Detection only runs when the configured port is `"auto"`. A failure before
//! the first connection is fatal and reported through the [`Notifier`]; after
//! that, lost connections are retried with a fixed delay.
//!
//! # Dispatch
//!
//! - `Sliders|...` is normalized, noise-filtered and broadcast to every
//!   subscriber, then acknowledged with `OK`
//! - `MuteButtons|...` goes to the mute consumer, which answers `MuteState|...`
//! - `SwitchOutput|n` and `GetCurrentOutputDevice` go to the output device
//!   consumer, which answers `OutputDevice|n`
//!
//! Consumer failures answer `ERROR`. Unknown commands get no reply.

mod dispatch;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod state;

pub use engine::{SerialIo, SerialIoConfig};
pub use error::SerialError;
pub use notifier::Notifier;
pub use state::ConnectionState;
