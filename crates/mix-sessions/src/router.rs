//! Event routing
//!
//! [`SessionRouter`] owns the session cache and turns control events into
//! session changes. Lookups that miss schedule a debounced refresh (the target
//! may have just started); failed session calls force one (the handles are
//! probably stale).

use std::sync::{Arc, Mutex, PoisonError};

use mix_config::{Config, ConfigHandle};
use mix_protocol::{
    ButtonsController, ConsumerError, MuteButtonClickEvent, MuteButtonConsumer, MuteButtonsState,
    OutputDeviceConsumer, OutputDeviceState, SliderMoveEvent, SlidersController,
    ToggleOutputDeviceClickEvent,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{PlatformError, RoutingError, SessionError};
use crate::map::{SessionMap, SessionSnapshot};
use crate::policy::RefreshPolicy;
use crate::session::{AudioPlatform, SessionFinder};
use crate::target::{is_session_mapped, SpecialTarget, Target};

/// Outcome of applying one event to its targets
#[derive(Debug, Default, Clone, Copy)]
struct RoutingPass {
    target_found: bool,
    adjustment_failed: bool,
}

/// Session cache plus event routing
pub struct SessionRouter {
    config: ConfigHandle,
    finder: Arc<dyn SessionFinder>,
    platform: Arc<dyn AudioPlatform>,
    policy: RefreshPolicy,
    cache: SessionMap,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionRouter {
    pub fn new(
        config: ConfigHandle,
        finder: Arc<dyn SessionFinder>,
        platform: Arc<dyn AudioPlatform>,
    ) -> Self {
        let policy = RefreshPolicy::from(&config.snapshot().session_refresh);
        Self::with_policy(config, finder, platform, policy)
    }

    /// Create a router with explicit refresh thresholds
    pub fn with_policy(
        config: ConfigHandle,
        finder: Arc<dyn SessionFinder>,
        platform: Arc<dyn AudioPlatform>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            config,
            finder,
            platform,
            policy,
            cache: SessionMap::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The session cache
    pub fn sessions(&self) -> &SessionMap {
        &self.cache
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Fill the cache and start consuming controller events
    ///
    /// Subscribes to slider moves and config changes, and registers this
    /// router as the controller's button and output device consumer.
    pub fn initialize(
        self: &Arc<Self>,
        sliders: &dyn SlidersController,
        buttons: &dyn ButtonsController,
    ) -> Result<(), RoutingError> {
        if let Err(e) = self.get_and_add_sessions() {
            warn!("Failed to get all sessions during initialization: {}", e);
            return Err(e.into());
        }

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);

        let router = Arc::clone(self);
        let mut changes = self.config.subscribe_to_changes();
        tasks.push(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        info!("Detected config reload, re-acquiring audio sessions");
                        router.refresh_sessions(false);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));

        let router = Arc::clone(self);
        let mut moves = sliders.subscribe_to_slider_move_events();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = moves.recv().await {
                router.handle_slider_move(event);
            }
            debug!("Slider move stream ended");
        }));

        buttons.set_mute_button_consumer(Arc::clone(self) as Arc<dyn MuteButtonConsumer>);
        buttons.set_output_device_consumer(Arc::clone(self) as Arc<dyn OutputDeviceConsumer>);

        Ok(())
    }

    /// Stop consuming events, release every session and the finder
    pub fn release(&self) -> Result<(), RoutingError> {
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            task.abort();
        }

        self.cache.clear();

        self.finder.release().map_err(|e| {
            warn!("Failed to release session finder: {}", e);
            RoutingError::Release(e)
        })
    }

    /// Rebuild the cache
    ///
    /// Without `force`, nothing happens inside the debounce window.
    pub fn refresh_sessions(&self, force: bool) {
        if !force && self.policy.debounced(self.cache.since_last_refresh()) {
            trace!("Skipping session refresh inside debounce window");
            return;
        }

        match self.get_and_add_sessions() {
            Ok(()) => debug!("Re-acquired sessions successfully"),
            Err(e) => {
                warn!("Failed to re-acquire all audio sessions: {}", e);
                self.cache.clear();
            }
        }
    }

    /// Enumerate every session and swap the result into the cache
    fn get_and_add_sessions(&self) -> Result<(), SessionError> {
        // Mark first so overlapping callers see a fresh cache and back off
        self.cache.begin_refresh();

        let sessions = self.finder.get_all_sessions()?;
        let config = self.config.snapshot();

        let mut snapshot = SessionSnapshot::new();
        for session in sessions {
            let mapped = is_session_mapped(session.key(), &config.slider_mapping);
            snapshot.add(session, mapped);
        }
        self.cache.replace(snapshot);

        info!(sessions = %self.cache, "Got all audio sessions successfully");
        Ok(())
    }

    fn maybe_refresh_sessions(&self) {
        if self.policy.is_stale(self.cache.since_last_refresh()) {
            debug!("Stale session map detected, refreshing");
            self.refresh_sessions(true);
        }
    }

    /// Resolve a configured target to session keys
    pub fn resolve_target(&self, raw: &str) -> Vec<String> {
        match Target::parse(raw) {
            Target::Literal(key) => vec![key],
            Target::Special(SpecialTarget::CurrentWindow) => self.current_window_keys(),
            Target::Special(SpecialTarget::AllUnmapped) => self.cache.unmapped_keys(),
            Target::UnknownSpecial(name) => {
                warn!("Unknown special target {:?}", name);
                Vec::new()
            }
        }
    }

    fn current_window_keys(&self) -> Vec<String> {
        // Runs on every event and may simply be unsupported here, so stay quiet
        let Ok(names) = self.platform.foreground_process_names() else {
            return Vec::new();
        };

        let mut keys: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let key = name.to_lowercase();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    fn escalate(&self, pass: RoutingPass) {
        if !pass.target_found {
            self.refresh_sessions(false);
        } else if pass.adjustment_failed {
            self.refresh_sessions(true);
        }
    }

    /// Apply a slider move to every session its targets resolve to
    pub fn handle_slider_move(&self, event: SliderMoveEvent) {
        self.maybe_refresh_sessions();

        let config = self.config.snapshot();
        let Some(targets) = config.slider_mapping.get(&event.slider_id) else {
            warn!("Ignoring data for unmapped slider ({})", event.slider_id);
            return;
        };

        let mut pass = RoutingPass::default();

        for target in targets {
            for key in self.resolve_target(target) {
                let Some(sessions) = self.cache.get(&key) else {
                    continue;
                };
                pass.target_found = true;

                for session in sessions {
                    if session.volume() != event.percent_value {
                        if let Err(e) = session.set_volume(event.percent_value) {
                            warn!(key = %key, "Failed to set target session volume: {}", e);
                            pass.adjustment_failed = true;
                        }
                    }
                }
            }
        }

        self.escalate(pass);
    }

    /// Apply a batch of mute clicks, returning the resulting state per click
    pub fn handle_mute_buttons(&self, events: &[MuteButtonClickEvent]) -> MuteButtonsState {
        self.maybe_refresh_sessions();
        debug!(count = events.len(), "Handling mute events");

        let config = self.config.snapshot();
        let mut state = MuteButtonsState {
            mute_buttons: vec![false; events.len()],
        };
        let mut pass = RoutingPass::default();

        for (slot, event) in events.iter().enumerate() {
            let Some(targets) = config.mute_button_mapping.get(&event.button_id) else {
                warn!("Ignoring data for unmapped button ({})", event.button_id);
                continue;
            };

            for target in targets {
                for key in self.resolve_target(target) {
                    let Some(sessions) = self.cache.get(&key) else {
                        continue;
                    };
                    pass.target_found = true;

                    for session in sessions {
                        state.mute_buttons[slot] = match session.set_mute(event.mute) {
                            Ok(()) => event.mute,
                            Err(e) => {
                                warn!(key = %key, "Failed to set target session mute state: {}", e);
                                pass.adjustment_failed = true;
                                session.mute()
                            }
                        };
                    }
                }
            }
        }

        self.escalate(pass);
        state
    }

    /// Switch the default output device, or report it for a query
    pub fn handle_toggle_output_device(
        &self,
        event: ToggleOutputDeviceClickEvent,
    ) -> Result<OutputDeviceState, RoutingError> {
        self.maybe_refresh_sessions();

        let config = self.config.snapshot();
        if event.is_query() {
            return Ok(self.current_output_device(&config));
        }

        let index = event.selected_output_device;
        let names = config
            .available_output_device
            .get(&index)
            .ok_or(RoutingError::UnknownOutputDevice(index))?;
        let [name] = names else {
            warn!(
                "Toggling to multiple output devices is not supported ({}): {:?}",
                index, names
            );
            return Err(RoutingError::AmbiguousOutputDevice {
                index,
                count: names.len(),
            });
        };

        let switched = match self.platform.device_id_by_name(name) {
            Ok(device_id) => {
                info!("Changing selected device to: {} ({})", device_id, name);
                let switched = match self.platform.set_default_output_device(&device_id) {
                    Ok(()) => true,
                    Err(PlatformError::AlreadyActive) => {
                        debug!("{} already is the default output device", name);
                        true
                    }
                    Err(e) => {
                        warn!("Failed to switch output device: {}", e);
                        false
                    }
                };
                // Sessions are device-scoped, the whole snapshot is now suspect
                self.refresh_sessions(true);
                switched
            }
            Err(e) => {
                warn!("Failed to get device ID by name: {}", e);
                false
            }
        };

        if switched {
            Ok(event.into())
        } else {
            Ok(self.current_output_device(&config))
        }
    }

    /// Index of the current default output device, -1 if unknown
    fn current_output_device(&self, config: &Config) -> OutputDeviceState {
        let selected_output_device = match self.finder.default_output_endpoint() {
            Ok(endpoint) => config
                .available_output_device
                .iter()
                .find(|(_, names)| {
                    names.iter().any(|name| {
                        name.eq_ignore_ascii_case(&endpoint.id)
                            || name.eq_ignore_ascii_case(&endpoint.friendly_name)
                    })
                })
                .map_or(ToggleOutputDeviceClickEvent::QUERY, |(index, _)| *index),
            Err(e) => {
                warn!("Failed to get default audio endpoint: {}", e);
                ToggleOutputDeviceClickEvent::QUERY
            }
        };

        OutputDeviceState {
            selected_output_device,
        }
    }
}

impl MuteButtonConsumer for SessionRouter {
    fn on_mute_buttons(
        &self,
        events: &[MuteButtonClickEvent],
    ) -> Result<MuteButtonsState, ConsumerError> {
        Ok(self.handle_mute_buttons(events))
    }
}

impl OutputDeviceConsumer for SessionRouter {
    fn on_toggle_output_device(
        &self,
        event: ToggleOutputDeviceClickEvent,
    ) -> Result<OutputDeviceState, ConsumerError> {
        self.handle_toggle_output_device(event)
            .map_err(ConsumerError::from)
    }
}
