//! Mixer Control Surface Protocol Library
//!
//! This crate provides parsing and encoding for the newline-delimited,
//! pipe-separated ASCII protocol spoken by slider/button control surfaces:
//!
//! - **Sliders**: `Sliders|4095|2048|...` - one 12-bit ADC reading per slider
//! - **MuteButtons**: `MuteButtons|true|false|...` - one requested mute state per button
//! - **SwitchOutput**: `SwitchOutput|1` - select an output device by index
//! - **GetCurrentOutputDevice**: query the active output device
//!
//! # Architecture
//!
//! - [`LineCodec`] is a streaming framer that handles partial reads and yields
//!   trimmed lines
//! - [`ControllerCommand::parse`] validates a line against the wire grammar and
//!   types its data tokens
//! - [`ControllerResponse`] encodes the host's reply, newline included
//! - [`SliderBaselines`] turns raw readings into [`SliderMoveEvent`]s with noise
//!   suppression
//!
//! # Example
//!
//! ```rust
//! use mix_protocol::{ControllerCommand, ControllerResponse, LineCodec};
//!
//! let mut codec = LineCodec::new();
//! codec.push_bytes(b"MuteButtons|true|false\r\n");
//!
//! let line = codec.next_line().unwrap();
//! let cmd = ControllerCommand::parse(&line).unwrap();
//! assert_eq!(cmd, ControllerCommand::MuteButtons(vec![Some(true), Some(false)]));
//!
//! let reply = ControllerResponse::MuteState(vec![true, false]);
//! assert_eq!(reply.encode(), b"MuteState|true|false\n");
//! ```

pub mod command;
pub mod controller;
pub mod error;
pub mod events;
pub mod line;
pub mod response;
pub mod slider;

pub use command::ControllerCommand;
pub use controller::{
    ButtonsController, MuteButtonConsumer, OutputDeviceConsumer, SlidersController,
};
pub use error::{ConsumerError, ParseError};
pub use events::{
    MuteButtonClickEvent, MuteButtonsState, OutputDeviceState, SliderMoveEvent,
    ToggleOutputDeviceClickEvent,
};
pub use line::{is_valid_line, LineCodec};
pub use response::ControllerResponse;
pub use slider::{normalize_reading, NoiseReduction, SliderBaselines, ADC_MAX};
