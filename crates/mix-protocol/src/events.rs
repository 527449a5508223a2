//! Typed controller events and the states echoed back for them

/// A slider moved far enough to be reported
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SliderMoveEvent {
    /// Slider index (position in the `Sliders` line)
    pub slider_id: usize,
    /// Normalized value in `[0.0, 1.0]`, two decimal digits
    pub percent_value: f32,
}

/// A mute button requested a mute state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MuteButtonClickEvent {
    /// Button index (position in the `MuteButtons` line)
    pub button_id: usize,
    /// Requested mute state
    pub mute: bool,
}

/// An output device selection (or query)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ToggleOutputDeviceClickEvent {
    /// Requested device index; negative means "report, change nothing"
    pub selected_output_device: i32,
}

impl ToggleOutputDeviceClickEvent {
    /// Reserved index for a current-device query
    pub const QUERY: i32 = -1;

    /// Create a switch request for a device index
    pub fn select(index: i32) -> Self {
        Self {
            selected_output_device: index,
        }
    }

    /// Create a current-device query
    pub fn query() -> Self {
        Self {
            selected_output_device: Self::QUERY,
        }
    }

    /// Whether this event only asks for the current device
    pub fn is_query(&self) -> bool {
        self.selected_output_device < 0
    }
}

/// Actual mute state per button after a batch was applied
///
/// May differ from what was requested if a session refused the change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuteButtonsState {
    /// One entry per input event, in input order
    pub mute_buttons: Vec<bool>,
}

/// Actual output device after a toggle was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputDeviceState {
    /// Index of the active device, or -1 if it matches no configured index
    pub selected_output_device: i32,
}

impl From<ToggleOutputDeviceClickEvent> for OutputDeviceState {
    fn from(event: ToggleOutputDeviceClickEvent) -> Self {
        Self {
            selected_output_device: event.selected_output_device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_sentinel() {
        assert!(ToggleOutputDeviceClickEvent::query().is_query());
        assert!(!ToggleOutputDeviceClickEvent::select(0).is_query());
        assert_eq!(ToggleOutputDeviceClickEvent::QUERY, -1);
    }

    #[test]
    fn test_echo_state_from_event() {
        let state = OutputDeviceState::from(ToggleOutputDeviceClickEvent::select(2));
        assert_eq!(state.selected_output_device, 2);
    }
}
