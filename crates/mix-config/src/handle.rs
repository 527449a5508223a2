//! Live configuration handle

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::model::Config;

const CONFIG_DIR_NAME: &str = "mixbridge";
const CONFIG_FILE_NAME: &str = "config.json";

/// Signal published after the configuration was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigChanged;

struct Shared {
    current: RwLock<Arc<Config>>,
    changes: broadcast::Sender<ConfigChanged>,
    path: Option<PathBuf>,
}

/// Shared, live-updating configuration
///
/// Clones share the same state. Readers take a [`snapshot`](Self::snapshot)
/// and never observe a half-applied update.
#[derive(Clone)]
pub struct ConfigHandle {
    shared: Arc<Shared>,
}

impl ConfigHandle {
    /// Create an in-memory handle with no backing file
    pub fn new(config: Config) -> Self {
        Self::with_path(config, None)
    }

    fn with_path(config: Config, path: Option<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            shared: Arc::new(Shared {
                current: RwLock::new(Arc::new(config)),
                changes,
                path,
            }),
        }
    }

    /// Get the XDG config directory for mixbridge
    /// Uses $XDG_CONFIG_HOME/mixbridge when absolute, falls back to ~/.config/mixbridge
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join(CONFIG_DIR_NAME));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join(CONFIG_DIR_NAME))
    }

    /// Default config file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join(CONFIG_FILE_NAME))
    }

    /// Load from the default config file
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(path)
    }

    /// Load from an explicit file
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = read_config(&path)?;
        Ok(Self::with_path(config, Some(path)))
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.shared.path.as_deref()
    }

    /// Current configuration
    pub fn snapshot(&self) -> Arc<Config> {
        self.shared
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration and notify subscribers
    pub fn update(&self, config: Config) {
        *self
            .shared
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(config);

        // No receivers is fine
        let receivers = self.shared.changes.send(ConfigChanged).unwrap_or(0);
        debug!(receivers, "Configuration updated");
    }

    /// Re-read the backing file and publish it
    pub fn reload(&self) -> Result<(), ConfigError> {
        let path = self.shared.path.as_ref().ok_or(ConfigError::NotFileBacked)?;
        let config = read_config(path)?;
        info!(path = %path.display(), "Configuration reloaded");
        self.update(config);
        Ok(())
    }

    /// Write the current configuration to the backing file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.shared.path.as_ref().ok_or(ConfigError::NotFileBacked)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = self.snapshot().to_json()?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })
    }

    /// Subscribe to change notifications
    ///
    /// A lagging receiver may miss signals but always sees the latest
    /// configuration through [`snapshot`](Self::snapshot).
    pub fn subscribe_to_changes(&self) -> broadcast::Receiver<ConfigChanged> {
        self.shared.changes.subscribe()
    }
}

impl std::fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigHandle")
            .field("path", &self.shared.path)
            .field("config", &self.snapshot())
            .finish()
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    Config::from_json(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ConfigHandle::load_from(dir.path().join("config.json")).unwrap();
        assert_eq!(*handle.snapshot(), Config::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ConfigHandle::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_update_notifies_every_subscriber() {
        let handle = ConfigHandle::new(Config::default());
        let mut a = handle.subscribe_to_changes();
        let mut b = handle.clone().subscribe_to_changes();

        let mut config = Config::default();
        config.invert_sliders = true;
        handle.update(config);

        assert_eq!(a.try_recv(), Ok(ConfigChanged));
        assert_eq!(b.try_recv(), Ok(ConfigChanged));
        assert_eq!(a.try_recv(), Err(TryRecvError::Empty));
        assert!(handle.snapshot().invert_sliders);
    }

    #[test]
    fn test_snapshot_is_stable_across_update() {
        let handle = ConfigHandle::new(Config::default());
        let before = handle.snapshot();

        let mut config = Config::default();
        config.serial_connection_info.com_port = "COM9".to_string();
        handle.update(config);

        assert_eq!(before.serial_connection_info.com_port, "auto");
        assert_eq!(handle.snapshot().serial_connection_info.com_port, "COM9");
    }

    #[test]
    fn test_save_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let handle = ConfigHandle::load_from(&path).unwrap();

        let mut config = Config::default();
        config.slider_mapping.insert(0, vec!["master".to_string()]);
        handle.update(config);
        handle.save().unwrap();

        let other = ConfigHandle::load_from(&path).unwrap();
        assert_eq!(other.snapshot().num_sliders(), 1);

        let mut changes = other.subscribe_to_changes();
        std::fs::write(&path, r#"{ "invert_sliders": true }"#).unwrap();
        other.reload().unwrap();
        assert_eq!(changes.try_recv(), Ok(ConfigChanged));
        assert!(other.snapshot().invert_sliders);
        assert_eq!(other.snapshot().num_sliders(), 0);
    }

    #[test]
    fn test_reload_without_file() {
        let handle = ConfigHandle::new(Config::default());
        assert!(matches!(handle.reload(), Err(ConfigError::NotFileBacked)));
    }
}
