//! Session refresh timing

use std::time::Duration;

use mix_config::SessionRefreshSettings;

/// Refresh thresholds for the session cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Debounce window: a non-forced refresh this soon after the last one is skipped
    pub min_interval: Duration,
    /// Staleness ceiling: an older cache is force-refreshed before handling an event
    pub max_interval: Duration,
}

impl RefreshPolicy {
    /// Whether a non-forced refresh should be skipped
    ///
    /// `None` means the cache was never filled.
    pub fn debounced(&self, since_last: Option<Duration>) -> bool {
        since_last.is_some_and(|elapsed| elapsed < self.min_interval)
    }

    /// Whether the cache is too old to trust
    pub fn is_stale(&self, since_last: Option<Duration>) -> bool {
        since_last.map_or(true, |elapsed| elapsed > self.max_interval)
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(45),
        }
    }
}

impl From<&SessionRefreshSettings> for RefreshPolicy {
    fn from(settings: &SessionRefreshSettings) -> Self {
        Self {
            min_interval: settings.min_interval(),
            max_interval: settings.max_interval(),
        }
    }
}
