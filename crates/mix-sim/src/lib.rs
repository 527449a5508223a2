//! Mixer Simulation Library
//!
//! This crate provides a simulation layer for running the bridge without a
//! control surface or a platform audio backend. It includes:
//!
//! - **VirtualAudioSystem**: in-memory audio sessions and output devices with
//!   failure injection, implementing both `SessionFinder` and `AudioPlatform`
//! - **VirtualControllerTransport**: a `Transport` whose ports are backed by
//!   virtual controller firmware over in-memory duplex streams
//!
//! # Example
//!
//! ```rust
//! use mix_sessions::{Session, SessionFinder};
//! use mix_sim::VirtualAudioSystem;
//!
//! let audio = VirtualAudioSystem::new();
//! let spotify = audio.add_app("Spotify.exe");
//!
//! let sessions = audio.get_all_sessions().unwrap();
//! assert_eq!(sessions[0].key(), "spotify.exe");
//!
//! sessions[0].set_volume(0.4).unwrap();
//! assert_eq!(spotify.volume(), 0.4);
//! ```

pub mod audio;
pub mod firmware;
pub mod transport;

pub use audio::{VirtualApp, VirtualAudioSystem, VirtualSession};
pub use firmware::{run_virtual_firmware, FirmwareCommand, VirtualController};
pub use transport::{VirtualControllerTransport, VirtualPort};
