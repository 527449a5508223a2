//! Slider reading normalization and noise suppression
//!
//! Controllers report raw 12-bit ADC readings. Each reading is clamped,
//! scaled to `[0.0, 1.0]`, rounded to two decimal digits and optionally
//! inverted. A move is only reported when it differs from the last
//! *reported* value by more than the noise threshold.

use crate::events::SliderMoveEvent;

/// Largest raw reading a 12-bit ADC produces
pub const ADC_MAX: i64 = 4095;

/// Baseline marker meaning "nothing reported yet", guarantees the next reading fires
const UNSET_BASELINE: f32 = -1.0;

/// Noise reduction level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NoiseReduction {
    /// Small threshold, most responsive
    Low,
    /// Balanced threshold
    #[default]
    Default,
    /// Large threshold for noisy potentiometers
    High,
}

impl NoiseReduction {
    /// Minimum change (exclusive) that counts as a move
    pub fn threshold(&self) -> f32 {
        match self {
            Self::Low => 0.015,
            Self::Default => 0.025,
            Self::High => 0.035,
        }
    }
}

/// Normalize a raw ADC reading to `[0.0, 1.0]` with two decimal digits
///
/// Readings above [`ADC_MAX`] clamp to 1.0, negative readings to 0.0.
pub fn normalize_reading(raw: i64, invert: bool) -> f32 {
    let scalar = if raw > ADC_MAX {
        1.0
    } else if raw < 0 {
        0.0
    } else {
        round_scalar(raw as f32 / ADC_MAX as f32)
    };

    if invert {
        1.0 - scalar
    } else {
        scalar
    }
}

/// Round to two decimal digits
fn round_scalar(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Last reported value per slider
#[derive(Debug, Clone)]
pub struct SliderBaselines {
    values: Vec<f32>,
}

impl SliderBaselines {
    /// Create baselines for `count` sliders, all unset
    pub fn new(count: usize) -> Self {
        Self {
            values: vec![UNSET_BASELINE; count],
        }
    }

    /// Forget every reported value and resize to `count` sliders
    ///
    /// The next reading of every slider is reported unconditionally.
    pub fn reset(&mut self, count: usize) {
        self.values.clear();
        self.values.resize(count, UNSET_BASELINE);
    }

    /// Number of tracked sliders
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no sliders are tracked
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Last reported value, `None` if nothing was reported since the last reset
    pub fn get(&self, slider_id: usize) -> Option<f32> {
        self.values
            .get(slider_id)
            .copied()
            .filter(|v| *v != UNSET_BASELINE)
    }

    /// Feed a normalized value, returning a move event if it clears the threshold
    ///
    /// The baseline only moves when an event fires, so slow drift made of many
    /// sub-threshold steps is still reported once it adds up.
    pub fn observe(
        &mut self,
        slider_id: usize,
        value: f32,
        threshold: f32,
    ) -> Option<SliderMoveEvent> {
        if slider_id >= self.values.len() {
            self.values.resize(slider_id + 1, UNSET_BASELINE);
        }

        let baseline = &mut self.values[slider_id];
        if (value - *baseline).abs() > threshold {
            *baseline = value;
            Some(SliderMoveEvent {
                slider_id,
                percent_value: value,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_bounds() {
        assert_eq!(normalize_reading(4095, false), 1.0);
        assert_eq!(normalize_reading(0, false), 0.0);
        assert_eq!(normalize_reading(2048, false), 0.5);
        assert_eq!(normalize_reading(1024, false), 0.25);
    }

    #[test]
    fn test_normalize_clamps() {
        assert_eq!(normalize_reading(5000, false), 1.0);
        assert_eq!(normalize_reading(-20, false), 0.0);
    }

    #[test]
    fn test_normalize_invert() {
        assert_eq!(normalize_reading(4095, true), 0.0);
        assert_eq!(normalize_reading(0, true), 1.0);
        assert_eq!(normalize_reading(9999, true), 0.0);
    }

    #[test]
    fn test_first_reading_always_fires() {
        let mut baselines = SliderBaselines::new(1);
        let event = baselines.observe(0, 0.0, NoiseReduction::High.threshold());
        assert_eq!(
            event,
            Some(SliderMoveEvent {
                slider_id: 0,
                percent_value: 0.0
            })
        );
        assert_eq!(baselines.get(0), Some(0.0));
    }

    #[test]
    fn test_noise_suppressed() {
        let threshold = NoiseReduction::Default.threshold();
        let mut baselines = SliderBaselines::new(1);

        assert!(baselines.observe(0, 0.5, threshold).is_some());
        assert!(baselines.observe(0, 0.51, threshold).is_none());
        assert!(baselines.observe(0, 0.52, threshold).is_none());
        // Drift accumulates against the last reported value, not the last reading
        assert!(baselines.observe(0, 0.53, threshold).is_some());
        assert_eq!(baselines.get(0), Some(0.53));
    }

    #[test]
    fn test_reset_resizes_and_unsets() {
        let mut baselines = SliderBaselines::new(2);
        baselines.observe(0, 0.4, 0.025);
        baselines.reset(3);

        assert_eq!(baselines.len(), 3);
        assert_eq!(baselines.get(0), None);
        assert!(baselines.observe(0, 0.4, 0.025).is_some());
    }

    #[test]
    fn test_observe_grows_for_unknown_index() {
        let mut baselines = SliderBaselines::new(1);
        assert!(baselines.observe(4, 0.2, 0.025).is_some());
        assert_eq!(baselines.len(), 5);
    }

    #[test]
    fn test_threshold_levels() {
        assert!(NoiseReduction::Low.threshold() < NoiseReduction::Default.threshold());
        assert!(NoiseReduction::Default.threshold() < NoiseReduction::High.threshold());
    }

    proptest! {
        #[test]
        fn in_range_readings_scale_and_round(raw in 0i64..=ADC_MAX) {
            let value = normalize_reading(raw, false);
            let expected = ((raw as f32 / 4095.0) * 100.0).round() / 100.0;
            prop_assert_eq!(value, expected);
            prop_assert!((0.0..=1.0).contains(&value));
        }

        #[test]
        fn out_of_range_readings_clamp(raw in 4096i64..1_000_000, neg in -1_000_000i64..0) {
            prop_assert_eq!(normalize_reading(raw, false), 1.0);
            prop_assert_eq!(normalize_reading(neg, false), 0.0);
        }

        #[test]
        fn event_fires_iff_beyond_threshold(
            baseline in 0.0f32..=1.0,
            value in 0.0f32..=1.0,
        ) {
            let threshold = NoiseReduction::Default.threshold();
            let mut baselines = SliderBaselines::new(1);
            baselines.observe(0, baseline, threshold);

            let fired = baselines.observe(0, value, threshold).is_some();
            prop_assert_eq!(fired, (value - baseline).abs() > threshold);
        }

        #[test]
        fn suppressed_readings_never_fire(
            steps in prop::collection::vec(-0.02f32..0.02, 1..20)
        ) {
            let threshold = NoiseReduction::Default.threshold();
            let mut baselines = SliderBaselines::new(1);
            baselines.observe(0, 0.5, threshold);

            for step in steps {
                let value = (0.5 + step).clamp(0.0, 1.0);
                prop_assert!(baselines.observe(0, value, threshold).is_none());
            }
        }
    }
}
