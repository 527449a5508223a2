//! Virtual audio backend
//!
//! Apps are the long-lived audio sources; every enumeration hands out fresh
//! [`VirtualSession`] handles onto them, the way a platform backend would.
//! Once released, or once its app is removed, a handle rejects every change.
//! Handles are only remembered when [`VirtualAudioSystem::with_handle_history`]
//! asks for it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mix_sessions::{
    AudioPlatform, DeviceEndpoint, PlatformError, Session, SessionError, SessionFinder,
};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy)]
struct AppState {
    volume: f32,
    muted: bool,
}

/// A simulated audio source (process or device)
#[derive(Debug)]
pub struct VirtualApp {
    key: String,
    state: Mutex<AppState>,
    fail_volume: AtomicBool,
    fail_mute: AtomicBool,
    volume_writes: AtomicUsize,
    gone: AtomicBool,
}

impl VirtualApp {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_lowercase(),
            state: Mutex::new(AppState {
                volume: 1.0,
                muted: false,
            }),
            fail_volume: AtomicBool::new(false),
            fail_mute: AtomicBool::new(false),
            volume_writes: AtomicUsize::new(0),
            gone: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn volume(&self) -> f32 {
        lock(&self.state).volume
    }

    pub fn muted(&self) -> bool {
        lock(&self.state).muted
    }

    /// Make volume changes fail until cleared
    pub fn set_fail_volume(&self, fail: bool) {
        self.fail_volume.store(fail, Ordering::SeqCst);
    }

    /// Make mute changes fail until cleared
    pub fn set_fail_mute(&self, fail: bool) {
        self.fail_mute.store(fail, Ordering::SeqCst);
    }

    /// Number of successful volume changes
    pub fn volume_writes(&self) -> usize {
        self.volume_writes.load(Ordering::SeqCst)
    }
}

/// A handle onto a [`VirtualApp`] from one enumeration
#[derive(Debug)]
pub struct VirtualSession {
    app: Arc<VirtualApp>,
    released: AtomicBool,
}

impl VirtualSession {
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn check_usable(&self) -> Result<(), SessionError> {
        if self.is_released() || self.app.gone.load(Ordering::SeqCst) {
            return Err(SessionError::Gone(self.app.key.clone()));
        }
        Ok(())
    }
}

impl Session for VirtualSession {
    fn key(&self) -> &str {
        &self.app.key
    }

    fn volume(&self) -> f32 {
        self.app.volume()
    }

    fn set_volume(&self, value: f32) -> Result<(), SessionError> {
        self.check_usable()?;
        if self.app.fail_volume.load(Ordering::SeqCst) {
            return Err(SessionError::Failed(format!(
                "volume change rejected for {}",
                self.app.key
            )));
        }

        lock(&self.app.state).volume = value;
        self.app.volume_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn mute(&self) -> bool {
        self.app.muted()
    }

    fn set_mute(&self, mute: bool) -> Result<(), SessionError> {
        self.check_usable()?;
        if self.app.fail_mute.load(Ordering::SeqCst) {
            return Err(SessionError::Failed(format!(
                "mute change rejected for {}",
                self.app.key
            )));
        }

        lock(&self.app.state).muted = mute;
        Ok(())
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
struct VirtualDevice {
    id: String,
    friendly_name: String,
}

/// In-memory audio system: session finder and platform services in one
#[derive(Debug, Default)]
pub struct VirtualAudioSystem {
    apps: Mutex<Vec<Arc<VirtualApp>>>,
    handles: Option<Mutex<Vec<Arc<VirtualSession>>>>,
    enumeration_delay: Mutex<Duration>,
    devices: Mutex<Vec<VirtualDevice>>,
    default_device: Mutex<Option<String>>,
    foreground: Mutex<Option<Vec<String>>>,
    fail_enumeration: AtomicBool,
    fail_switch: AtomicBool,
    enumerations: AtomicUsize,
    released: AtomicBool,
}

impl VirtualAudioSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember every handle handed out, for [`handles`](Self::handles)
    pub fn with_handle_history(mut self) -> Self {
        self.handles = Some(Mutex::new(Vec::new()));
        self
    }

    /// Start an audio source; several sources may share a key
    pub fn add_app(&self, key: &str) -> Arc<VirtualApp> {
        let app = Arc::new(VirtualApp::new(key));
        lock(&self.apps).push(Arc::clone(&app));
        debug!("Virtual app {} started", app.key);
        app
    }

    /// Stop every source with this key; handles onto them go stale
    pub fn remove_app(&self, key: &str) {
        lock(&self.apps).retain(|app| {
            let keep = app.key != key;
            if !keep {
                app.gone.store(true, Ordering::SeqCst);
            }
            keep
        });
    }

    /// Register an output device
    pub fn add_device(&self, id: &str, friendly_name: &str) {
        lock(&self.devices).push(VirtualDevice {
            id: id.to_string(),
            friendly_name: friendly_name.to_string(),
        });
        let mut default = lock(&self.default_device);
        if default.is_none() {
            *default = Some(id.to_string());
        }
    }

    /// Id of the current default output device
    pub fn default_device_id(&self) -> Option<String> {
        lock(&self.default_device).clone()
    }

    /// Set the foreground process names; `None` means no foreground window support
    pub fn set_foreground(&self, names: Option<Vec<String>>) {
        *lock(&self.foreground) = names;
    }

    pub fn set_fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    /// Block each enumeration for this long, like a slow platform call
    pub fn set_enumeration_delay(&self, delay: Duration) {
        *lock(&self.enumeration_delay) = delay;
    }

    /// Make device switches fail until cleared
    pub fn set_fail_switch(&self, fail: bool) {
        self.fail_switch.store(fail, Ordering::SeqCst);
    }

    /// Number of enumerations so far
    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    /// Every handle handed out, oldest first; empty without handle history
    pub fn handles(&self) -> Vec<Arc<VirtualSession>> {
        self.handles
            .as_ref()
            .map(|handles| lock(handles).clone())
            .unwrap_or_default()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl SessionFinder for VirtualAudioSystem {
    fn get_all_sessions(&self) -> Result<Vec<Arc<dyn Session>>, SessionError> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(SessionError::Failed("enumeration failed".to_string()));
        }

        let delay = *lock(&self.enumeration_delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let fresh: Vec<Arc<VirtualSession>> = lock(&self.apps)
            .iter()
            .map(|app| {
                Arc::new(VirtualSession {
                    app: Arc::clone(app),
                    released: AtomicBool::new(false),
                })
            })
            .collect();

        if let Some(handles) = &self.handles {
            lock(handles).extend(fresh.iter().cloned());
        }

        Ok(fresh
            .into_iter()
            .map(|s| s as Arc<dyn Session>)
            .collect())
    }

    fn default_output_endpoint(&self) -> Result<DeviceEndpoint, SessionError> {
        let id = self
            .default_device_id()
            .ok_or_else(|| SessionError::Failed("no default output device".to_string()))?;

        let devices = lock(&self.devices);
        let device = devices
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| SessionError::Failed(format!("device {} vanished", id)))?;

        Ok(DeviceEndpoint {
            id: device.id.clone(),
            friendly_name: device.friendly_name.clone(),
        })
    }

    fn release(&self) -> Result<(), SessionError> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl AudioPlatform for VirtualAudioSystem {
    fn foreground_process_names(&self) -> Result<Vec<String>, PlatformError> {
        lock(&self.foreground)
            .clone()
            .ok_or(PlatformError::Unsupported)
    }

    fn device_id_by_name(&self, friendly_name: &str) -> Result<String, PlatformError> {
        lock(&self.devices)
            .iter()
            .find(|d| d.friendly_name.eq_ignore_ascii_case(friendly_name))
            .map(|d| d.id.clone())
            .ok_or_else(|| PlatformError::DeviceNotFound(friendly_name.to_string()))
    }

    fn set_default_output_device(&self, device_id: &str) -> Result<(), PlatformError> {
        if self.fail_switch.load(Ordering::SeqCst) {
            return Err(PlatformError::Failed("switch rejected".to_string()));
        }
        if !lock(&self.devices).iter().any(|d| d.id == device_id) {
            return Err(PlatformError::DeviceNotFound(device_id.to_string()));
        }

        let mut default = lock(&self.default_device);
        if default.as_deref() == Some(device_id) {
            return Err(PlatformError::AlreadyActive);
        }
        *default = Some(device_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_hands_out_fresh_handles() {
        let audio = VirtualAudioSystem::new().with_handle_history();
        audio.add_app("chrome.exe");
        audio.add_app("chrome.exe");

        let first = audio.get_all_sessions().unwrap();
        let second = audio.get_all_sessions().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(audio.handles().len(), 4);
        assert_eq!(audio.enumerations(), 2);
    }

    #[test]
    fn test_handles_are_not_retained_by_default() {
        let audio = VirtualAudioSystem::new();
        let app = audio.add_app("master");

        for _ in 0..10 {
            drop(audio.get_all_sessions().unwrap());
        }

        assert!(audio.handles().is_empty());
        // Only the system and the caller hold the app, no handle kept it alive
        assert_eq!(Arc::strong_count(&app), 2);
        assert_eq!(audio.enumerations(), 10);
    }

    #[test]
    fn test_released_and_removed_handles_reject_changes() {
        let audio = VirtualAudioSystem::new();
        let app = audio.add_app("game.exe");

        let sessions = audio.get_all_sessions().unwrap();
        sessions[0].release();
        assert!(matches!(
            sessions[0].set_volume(0.2),
            Err(SessionError::Gone(_))
        ));

        let sessions = audio.get_all_sessions().unwrap();
        audio.remove_app("game.exe");
        assert!(sessions[0].set_mute(true).is_err());
        assert!(!app.muted());
    }

    #[test]
    fn test_failure_injection() {
        let audio = VirtualAudioSystem::new();
        let app = audio.add_app("obs64.exe");
        let sessions = audio.get_all_sessions().unwrap();

        app.set_fail_volume(true);
        assert!(sessions[0].set_volume(0.5).is_err());
        app.set_fail_volume(false);
        sessions[0].set_volume(0.5).unwrap();
        assert_eq!(app.volume(), 0.5);
        assert_eq!(app.volume_writes(), 1);

        audio.set_fail_enumeration(true);
        assert!(audio.get_all_sessions().is_err());
    }

    #[test]
    fn test_device_switching() {
        let audio = VirtualAudioSystem::new();
        audio.add_device("{0.0.0}.{speakers}", "Speakers (Realtek Audio)");
        audio.add_device("{0.0.0}.{headset}", "Headset (USB Audio)");

        assert_eq!(
            audio.default_output_endpoint().unwrap().friendly_name,
            "Speakers (Realtek Audio)"
        );

        let id = audio.device_id_by_name("headset (usb audio)").unwrap();
        audio.set_default_output_device(&id).unwrap();
        assert_eq!(audio.default_device_id().as_deref(), Some("{0.0.0}.{headset}"));

        assert!(matches!(
            audio.set_default_output_device(&id),
            Err(PlatformError::AlreadyActive)
        ));
        assert!(matches!(
            audio.device_id_by_name("HDMI"),
            Err(PlatformError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_foreground_unsupported_by_default() {
        let audio = VirtualAudioSystem::new();
        assert!(matches!(
            audio.foreground_process_names(),
            Err(PlatformError::Unsupported)
        ));
        audio.set_foreground(Some(vec!["Code.exe".to_string()]));
        assert_eq!(audio.foreground_process_names().unwrap(), vec!["Code.exe"]);
    }
}
