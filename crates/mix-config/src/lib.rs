//! Mixer Bridge Configuration
//!
//! This crate provides the configuration model shared by the serial engine and
//! the session router, plus a live handle that swaps snapshots on reload and
//! notifies subscribers.
//!
//! # Example
//!
//! ```rust
//! use mix_config::{Config, ConfigHandle};
//!
//! let config: Config = serde_json::from_str(r#"{
//!     "slider_mapping": { "0": "master", "1": ["chrome.exe", "firefox.exe"] },
//!     "serial_connection_info": { "com_port": "COM4" }
//! }"#).unwrap();
//!
//! let handle = ConfigHandle::new(config);
//! let mut changes = handle.subscribe_to_changes();
//!
//! assert_eq!(handle.snapshot().slider_mapping.num_sliders(), 2);
//! assert_eq!(handle.snapshot().serial_connection_info.baud_rate, 115200);
//!
//! handle.update(Default::default());
//! assert!(changes.try_recv().is_ok());
//! ```

pub mod error;
pub mod handle;
pub mod mapping;
pub mod model;

pub use error::ConfigError;
pub use handle::{ConfigChanged, ConfigHandle};
pub use mapping::Mapping;
pub use model::{Config, SerialConnectionInfo, SessionRefreshSettings, AUTO_PORT};
