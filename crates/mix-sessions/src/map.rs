//! Session cache
//!
//! Maps a session key to every live session carrying it. The map, the last
//! refresh time and the unmapped list sit behind one lock; every accessor
//! holds it only for its own duration. A refresh builds a [`SessionSnapshot`]
//! outside the lock and swaps it in whole, so the cache never mixes two
//! enumerations.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::session::Session;

/// One full enumeration, grouped by key
#[derive(Default)]
pub struct SessionSnapshot {
    sessions: HashMap<String, Vec<Arc<dyn Session>>>,
    unmapped: Vec<Arc<dyn Session>>,
}

impl SessionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session under its key; unmapped ones are also listed separately
    pub fn add(&mut self, session: Arc<dyn Session>, mapped: bool) {
        if !mapped {
            self.unmapped.push(Arc::clone(&session));
        }
        let key = session.key().to_string();
        self.sessions.entry(key).or_default().push(session);
    }

    pub fn len(&self) -> usize {
        self.sessions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn release_all(sessions: HashMap<String, Vec<Arc<dyn Session>>>) {
    for session in sessions.into_values().flatten() {
        session.release();
    }
}

#[derive(Default)]
struct CacheState {
    sessions: HashMap<String, Vec<Arc<dyn Session>>>,
    last_refresh: Option<Instant>,
    unmapped: Vec<Arc<dyn Session>>,
}

/// Key to sessions cache
#[derive(Default)]
pub struct SessionMap {
    state: Mutex<CacheState>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sessions stored under a key
    pub fn get(&self, key: &str) -> Option<Vec<Arc<dyn Session>>> {
        self.lock().sessions.get(key).cloned()
    }

    /// Release every session and empty the map
    pub fn clear(&self) {
        let mut state = self.lock();
        debug!("Releasing and clearing all audio sessions");

        release_all(std::mem::take(&mut state.sessions));
        state.unmapped.clear();
    }

    /// Mark a refresh as starting now
    pub fn begin_refresh(&self) {
        self.lock().last_refresh = Some(Instant::now());
    }

    /// Swap in a fresh enumeration, releasing every session it supersedes
    pub fn replace(&self, snapshot: SessionSnapshot) {
        let mut state = self.lock();
        debug!("Replacing audio sessions with a fresh snapshot");

        let previous = std::mem::replace(&mut state.sessions, snapshot.sessions);
        state.unmapped = snapshot.unmapped;
        release_all(previous);
    }

    /// Keys of the sessions found unmapped by the last refresh
    pub fn unmapped_keys(&self) -> Vec<String> {
        self.lock()
            .unmapped
            .iter()
            .map(|s| s.key().to_string())
            .collect()
    }

    /// Time since the last refresh started, `None` if there never was one
    pub fn since_last_refresh(&self) -> Option<Duration> {
        self.lock().last_refresh.map(|at| at.elapsed())
    }

    /// Total number of sessions across all keys
    pub fn session_count(&self) -> usize {
        self.lock().sessions.values().map(Vec::len).sum()
    }

    /// Cached keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().sessions.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Display for SessionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} audio sessions>", self.session_count())
    }
}

impl fmt::Debug for SessionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMap")
            .field("keys", &self.keys())
            .field("since_last_refresh", &self.since_last_refresh())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubSession {
        key: String,
        released: AtomicBool,
    }

    impl StubSession {
        fn new(key: &str) -> Arc<Self> {
            Arc::new(Self {
                key: key.to_string(),
                released: AtomicBool::new(false),
            })
        }
    }

    impl Session for StubSession {
        fn key(&self) -> &str {
            &self.key
        }
        fn volume(&self) -> f32 {
            0.0
        }
        fn set_volume(&self, _value: f32) -> Result<(), SessionError> {
            Ok(())
        }
        fn mute(&self) -> bool {
            false
        }
        fn set_mute(&self, _mute: bool) -> Result<(), SessionError> {
            Ok(())
        }
        fn release(&self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn snapshot(sessions: &[&Arc<StubSession>]) -> SessionSnapshot {
        let mut snapshot = SessionSnapshot::new();
        for session in sessions {
            snapshot.add(Arc::clone(session) as Arc<dyn Session>, true);
        }
        snapshot
    }

    #[test]
    fn test_shared_keys_append() {
        let map = SessionMap::new();
        map.replace(snapshot(&[
            &StubSession::new("chrome.exe"),
            &StubSession::new("chrome.exe"),
            &StubSession::new("master"),
        ]));

        assert_eq!(map.get("chrome.exe").map(|s| s.len()), Some(2));
        assert!(map.get("firefox.exe").is_none());
        assert_eq!(map.session_count(), 3);
        assert_eq!(map.keys(), vec!["chrome.exe", "master"]);
        assert_eq!(map.to_string(), "<3 audio sessions>");
    }

    #[test]
    fn test_clear_releases_everything() {
        let map = SessionMap::new();
        let a = StubSession::new("a.exe");
        let b = StubSession::new("b.exe");
        map.replace(snapshot(&[&a, &b]));

        map.clear();

        assert!(a.released.load(Ordering::SeqCst));
        assert!(b.released.load(Ordering::SeqCst));
        assert_eq!(map.session_count(), 0);
        assert_eq!(map.to_string(), "<0 audio sessions>");
    }

    #[test]
    fn test_replace_swaps_whole_snapshot() {
        let map = SessionMap::new();
        assert_eq!(map.since_last_refresh(), None);

        let old = StubSession::new("steam.exe");
        let mut first = SessionSnapshot::new();
        first.add(Arc::clone(&old) as Arc<dyn Session>, false);
        map.replace(first);
        assert_eq!(map.unmapped_keys(), vec!["steam.exe"]);

        let new = StubSession::new("master");
        map.begin_refresh();
        map.replace(snapshot(&[&new]));

        assert!(old.released.load(Ordering::SeqCst));
        assert!(!new.released.load(Ordering::SeqCst));
        assert!(map.unmapped_keys().is_empty());
        assert_eq!(map.keys(), vec!["master"]);
        assert!(map.since_last_refresh().is_some());
    }
}
