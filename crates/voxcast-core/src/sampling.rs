//! Sampling rate state and the adaptive quality policy.

use serde::{Deserialize, Serialize};

/// Current sampling rate and the frame time it is tuned toward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingState {
    /// Step-size divisor along each ray (higher is finer and slower).
    pub sampling_rate: f32,
    /// Frame time the adaptive policy aims for, in milliseconds.
    pub target_frame_time_ms: f32,
}

impl SamplingState {
    /// Creates a sampling state; non-positive rates fall back to 1.
    #[must_use]
    pub fn new(sampling_rate: f32, target_frame_time_ms: f32) -> Self {
        let sampling_rate = if sampling_rate.is_finite() && sampling_rate > 0.0 {
            sampling_rate
        } else {
            1.0
        };
        Self {
            sampling_rate,
            target_frame_time_ms,
        }
    }
}

impl Default for SamplingState {
    fn default() -> Self {
        Self::new(1.0, 32.0)
    }
}

/// Policy for nudging the sampling rate toward the target frame time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveSampling {
    /// Lowest allowed sampling rate.
    pub min_rate: f32,
    /// Highest allowed sampling rate.
    pub max_rate: f32,
    /// Multiplicative change per adjustment (> 1).
    pub step_factor: f32,
    /// Frame times below `comfort_ratio * target` raise the rate.
    pub comfort_ratio: f32,
}

impl Default for AdaptiveSampling {
    fn default() -> Self {
        Self {
            min_rate: 0.25,
            max_rate: 4.0,
            step_factor: 1.1,
            comfort_ratio: 0.75,
        }
    }
}

/// Direction of the last adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateChange {
    /// Rate lowered because frames were slow.
    Decreased,
    /// Rate raised because frames were fast.
    Increased,
    /// Rate unchanged.
    Unchanged,
}

impl AdaptiveSampling {
    /// Clamps `rate` into `[min_rate, max_rate]`.
    #[must_use]
    pub fn clamp(&self, rate: f32) -> f32 {
        let lo = self.min_rate.min(self.max_rate);
        let hi = self.max_rate.max(self.min_rate);
        if rate.is_nan() {
            return lo;
        }
        rate.clamp(lo, hi)
    }

    /// Adjusts `state.sampling_rate` after a frame that took `frame_time_ms`.
    ///
    /// Non-finite or negative measurements are ignored. The result is
    /// always within `[min_rate, max_rate]`.
    pub fn adjust(&self, state: &mut SamplingState, frame_time_ms: f32) -> RateChange {
        let before = state.sampling_rate;
        if !frame_time_ms.is_finite() || frame_time_ms < 0.0 {
            state.sampling_rate = self.clamp(before);
            return RateChange::Unchanged;
        }

        let factor = if self.step_factor.is_finite() && self.step_factor > 1.0 {
            self.step_factor
        } else {
            1.0
        };

        let target = state.target_frame_time_ms;
        let proposed = if frame_time_ms > target {
            before / factor
        } else if frame_time_ms < target * self.comfort_ratio {
            before * factor
        } else {
            before
        };
        state.sampling_rate = self.clamp(proposed);

        if state.sampling_rate < before {
            RateChange::Decreased
        } else if state.sampling_rate > before {
            RateChange::Increased
        } else {
            RateChange::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_slow_frames_lower_rate() {
        let policy = AdaptiveSampling::default();
        let mut state = SamplingState::new(1.0, 32.0);
        assert_eq!(policy.adjust(&mut state, 50.0), RateChange::Decreased);
        assert!(state.sampling_rate < 1.0);
    }

    #[test]
    fn test_fast_frames_raise_rate() {
        let policy = AdaptiveSampling::default();
        let mut state = SamplingState::new(1.0, 32.0);
        assert_eq!(policy.adjust(&mut state, 5.0), RateChange::Increased);
        assert!((state.sampling_rate - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_comfort_band_holds_rate() {
        let policy = AdaptiveSampling::default();
        let mut state = SamplingState::new(1.0, 32.0);
        assert_eq!(policy.adjust(&mut state, 30.0), RateChange::Unchanged);
        assert_eq!(state.sampling_rate, 1.0);
    }

    #[test]
    fn test_nan_measurement_ignored() {
        let policy = AdaptiveSampling::default();
        let mut state = SamplingState::new(2.0, 32.0);
        assert_eq!(policy.adjust(&mut state, f32::NAN), RateChange::Unchanged);
        assert_eq!(state.sampling_rate, 2.0);
    }

    #[test]
    fn test_invalid_initial_rate() {
        assert_eq!(SamplingState::new(0.0, 32.0).sampling_rate, 1.0);
        assert_eq!(SamplingState::new(-3.0, 32.0).sampling_rate, 1.0);
    }

    #[test]
    fn test_repeated_slow_frames_stop_at_min() {
        let policy = AdaptiveSampling::default();
        let mut state = SamplingState::new(1.0, 32.0);
        for _ in 0..200 {
            policy.adjust(&mut state, 1000.0);
        }
        assert_eq!(state.sampling_rate, policy.min_rate);
        assert_eq!(policy.adjust(&mut state, 1000.0), RateChange::Unchanged);
    }

    proptest! {
        #[test]
        fn prop_rate_stays_in_bounds(
            initial in 0.01f32..100.0,
            frames in proptest::collection::vec(prop_oneof![
                0.0f32..1.0e6,
                Just(f32::INFINITY),
                Just(f32::NAN),
                Just(-1.0f32),
            ], 1..64),
        ) {
            let policy = AdaptiveSampling::default();
            let mut state = SamplingState::new(initial, 32.0);
            for ms in frames {
                policy.adjust(&mut state, ms);
                prop_assert!(state.sampling_rate >= policy.min_rate);
                prop_assert!(state.sampling_rate <= policy.max_rate);
            }
        }
    }
}
