//! Controller capabilities
//!
//! A control surface plays two roles: it produces slider moves that anyone may
//! subscribe to, and it asks a single consumer to apply button/device requests
//! and report back the resulting state. One component usually implements both.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::ConsumerError;
use crate::events::{
    MuteButtonClickEvent, MuteButtonsState, OutputDeviceState, SliderMoveEvent,
    ToggleOutputDeviceClickEvent,
};

/// Applies a batch of mute button clicks and reports the actual states
pub trait MuteButtonConsumer: Send + Sync {
    /// Apply the batch; the result carries one state per event, in order
    fn on_mute_buttons(
        &self,
        events: &[MuteButtonClickEvent],
    ) -> Result<MuteButtonsState, ConsumerError>;
}

/// Applies an output device selection (or answers a query)
pub trait OutputDeviceConsumer: Send + Sync {
    /// Apply the selection and report the device that is actually active
    fn on_toggle_output_device(
        &self,
        event: ToggleOutputDeviceClickEvent,
    ) -> Result<OutputDeviceState, ConsumerError>;
}

impl<F> MuteButtonConsumer for F
where
    F: Fn(&[MuteButtonClickEvent]) -> Result<MuteButtonsState, ConsumerError> + Send + Sync,
{
    fn on_mute_buttons(
        &self,
        events: &[MuteButtonClickEvent],
    ) -> Result<MuteButtonsState, ConsumerError> {
        self(events)
    }
}

impl<F> OutputDeviceConsumer for F
where
    F: Fn(ToggleOutputDeviceClickEvent) -> Result<OutputDeviceState, ConsumerError>
        + Send
        + Sync,
{
    fn on_toggle_output_device(
        &self,
        event: ToggleOutputDeviceClickEvent,
    ) -> Result<OutputDeviceState, ConsumerError> {
        self(event)
    }
}

/// Source of slider move events
pub trait SlidersController: Send + Sync {
    /// Subscribe to slider moves
    ///
    /// Every subscriber receives every event. Delivery applies back-pressure:
    /// the producer waits until each subscriber has room for the event.
    fn subscribe_to_slider_move_events(&self) -> mpsc::Receiver<SliderMoveEvent>;
}

/// Source of button and device requests that expect an answer
pub trait ButtonsController: Send + Sync {
    /// Register the consumer for mute button batches, replacing any previous one
    fn set_mute_button_consumer(&self, consumer: Arc<dyn MuteButtonConsumer>);

    /// Register the consumer for output device toggles, replacing any previous one
    fn set_output_device_consumer(&self, consumer: Arc<dyn OutputDeviceConsumer>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_consumers() {
        let mute = |events: &[MuteButtonClickEvent]| -> Result<MuteButtonsState, ConsumerError> {
            Ok(MuteButtonsState {
                mute_buttons: events.iter().map(|e| e.mute).collect(),
            })
        };
        let state = mute
            .on_mute_buttons(&[
                MuteButtonClickEvent {
                    button_id: 0,
                    mute: true,
                },
                MuteButtonClickEvent {
                    button_id: 1,
                    mute: false,
                },
            ])
            .unwrap();
        assert_eq!(state.mute_buttons, vec![true, false]);

        let device = |event: ToggleOutputDeviceClickEvent| -> Result<OutputDeviceState, ConsumerError> {
            Ok(OutputDeviceState::from(event))
        };
        let state = device
            .on_toggle_output_device(ToggleOutputDeviceClickEvent::select(3))
            .unwrap();
        assert_eq!(state.selected_output_device, 3);
    }
}
