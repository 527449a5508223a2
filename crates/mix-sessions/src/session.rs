//! Platform audio session seam

use std::sync::Arc;

use crate::error::{PlatformError, SessionError};

/// A live handle to one controllable audio entity
///
/// Several sessions may share a key, e.g. every tab of a browser.
pub trait Session: Send + Sync {
    /// Lower-cased process or device name
    fn key(&self) -> &str;

    /// Current volume in `[0.0, 1.0]`
    fn volume(&self) -> f32;

    fn set_volume(&self, value: f32) -> Result<(), SessionError>;

    fn mute(&self) -> bool;

    fn set_mute(&self, mute: bool) -> Result<(), SessionError>;

    /// Give the handle back to the platform; the session is unusable afterwards
    fn release(&self);
}

/// A default audio device as the platform reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    /// Platform device identifier
    pub id: String,
    /// Human-readable name, e.g. `Speakers (Realtek Audio)`
    pub friendly_name: String,
}

/// Enumerates the host's audio sessions
pub trait SessionFinder: Send + Sync {
    /// Take a full snapshot of every current session
    fn get_all_sessions(&self) -> Result<Vec<Arc<dyn Session>>, SessionError>;

    /// The current default output device
    fn default_output_endpoint(&self) -> Result<DeviceEndpoint, SessionError>;

    fn release(&self) -> Result<(), SessionError>;
}

/// Host services outside the session list
pub trait AudioPlatform: Send + Sync {
    /// Names of the processes owning the foreground window
    ///
    /// May legitimately return several names (host and contained process).
    fn foreground_process_names(&self) -> Result<Vec<String>, PlatformError>;

    /// Platform identifier of the output device with this friendly name
    fn device_id_by_name(&self, friendly_name: &str) -> Result<String, PlatformError>;

    /// Make this device the default output
    fn set_default_output_device(&self, device_id: &str) -> Result<(), PlatformError>;
}
