//! Command dispatch and the write path

use std::sync::PoisonError;

use mix_protocol::{
    normalize_reading, ControllerCommand, ControllerResponse, MuteButtonClickEvent, ParseError,
    SliderMoveEvent, ToggleOutputDeviceClickEvent,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::engine::{lock, Inner};

impl Inner {
    /// Dispatch a line and write the reply, if any
    pub(crate) async fn process_line(&self, line: &str) {
        if let Some(response) = self.handle_line(line).await {
            self.send_response(&response).await;
        }
    }

    pub(crate) async fn handle_line(&self, line: &str) -> Option<ControllerResponse> {
        let command = match ControllerCommand::parse(line) {
            Ok(command) => command,
            Err(ParseError::EmptyLine) => return None,
            Err(e) => {
                debug!("Discarding {}", e);
                return None;
            }
        };
        trace!("Received {:?}", command);

        match command {
            ControllerCommand::Sliders(readings) => {
                self.handle_sliders(&readings).await;
                Some(ControllerResponse::Ok)
            }
            ControllerCommand::MuteButtons(states) => Some(self.handle_mute_buttons(&states)),
            ControllerCommand::SwitchOutput(index) => Some(self.handle_switch_output(index)),
            ControllerCommand::GetCurrentOutputDevice => {
                Some(self.toggle_output_device(ToggleOutputDeviceClickEvent::query()))
            }
            ControllerCommand::Unknown(name) => {
                debug!("Ignoring unknown command {}", name);
                None
            }
        }
    }

    async fn handle_sliders(&self, readings: &[Option<i64>]) {
        let config = self.config.snapshot();
        let expected = config.num_sliders();
        if readings.len() != expected {
            warn!(
                expected,
                received = readings.len(),
                "Slider count does not match the config"
            );
            return;
        }

        let threshold = config.noise_reduction.threshold();
        let events: Vec<SliderMoveEvent> = {
            let mut baselines = lock(&self.baselines);
            readings
                .iter()
                .enumerate()
                .filter_map(|(slider_id, reading)| {
                    let Some(raw) = reading else {
                        warn!("Unparsable reading for slider {}", slider_id);
                        return None;
                    };
                    let value = normalize_reading(*raw, config.invert_sliders);
                    baselines.observe(slider_id, value, threshold)
                })
                .collect()
        };

        for event in events {
            trace!(
                slider = event.slider_id,
                value = event.percent_value,
                "Slider moved"
            );
            self.broadcast(event).await;
        }
    }

    /// Deliver to every subscriber, waiting for room in each channel
    async fn broadcast(&self, event: SliderMoveEvent) {
        let subscribers = lock(&self.subscribers).clone();

        let mut any_closed = false;
        for subscriber in &subscribers {
            if subscriber.send(event).await.is_err() {
                any_closed = true;
            }
        }

        if any_closed {
            let mut subscribers = lock(&self.subscribers);
            subscribers.retain(|s| !s.is_closed());
            debug!(remaining = subscribers.len(), "Dropped closed slider subscribers");
        }
    }

    fn handle_mute_buttons(&self, states: &[Option<bool>]) -> ControllerResponse {
        let consumer = self
            .mute_consumer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(consumer) = consumer else {
            warn!("No mute button consumer registered");
            return ControllerResponse::Error;
        };

        let events: Vec<MuteButtonClickEvent> = states
            .iter()
            .enumerate()
            .filter_map(|(button_id, state)| match state {
                Some(mute) => Some(MuteButtonClickEvent {
                    button_id,
                    mute: *mute,
                }),
                None => {
                    warn!("Unparsable state for mute button {}", button_id);
                    None
                }
            })
            .collect();

        if events.is_empty() {
            warn!("No valid mute button states in line");
            return ControllerResponse::Error;
        }

        match consumer.on_mute_buttons(&events) {
            Ok(state) => ControllerResponse::MuteState(state.mute_buttons),
            Err(e) => {
                warn!("Mute buttons failed: {}", e);
                ControllerResponse::Error
            }
        }
    }

    fn handle_switch_output(&self, index: Option<i32>) -> ControllerResponse {
        match index {
            Some(index) => self.toggle_output_device(ToggleOutputDeviceClickEvent::select(index)),
            None => {
                warn!("SwitchOutput without a valid device index");
                ControllerResponse::Error
            }
        }
    }

    fn toggle_output_device(&self, event: ToggleOutputDeviceClickEvent) -> ControllerResponse {
        let consumer = self
            .device_consumer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(consumer) = consumer else {
            warn!("No output device consumer registered");
            return ControllerResponse::Error;
        };

        match consumer.on_toggle_output_device(event) {
            Ok(state) => ControllerResponse::OutputDevice(state.selected_output_device),
            Err(e) => {
                warn!("Output device toggle failed: {}", e);
                ControllerResponse::Error
            }
        }
    }

    pub(crate) async fn send_response(&self, response: &ControllerResponse) {
        let mut writer = self.writer.lock().await;
        let Some(port) = writer.as_mut() else {
            warn!("Not connected, dropping response {}", response);
            return;
        };

        let result = async {
            port.write_all(&response.encode()).await?;
            port.flush().await
        }
        .await;

        match result {
            Ok(()) => trace!("Sent {}", response),
            Err(e) => warn!("Failed to write {}: {}", response, e),
        }
    }
}
