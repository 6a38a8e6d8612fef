//! # Fallback Policy
//!
//! Heuristics layered over learned bindings. They live here, away from the
//! state machine, so each can be switched off from config.
//!
//! - `partial_window_fallback`: while a learned mission only has its minimum
//!   window, peak detection stands in for one cycle
//! - `low_value_correction`: a learned heart rate under the threshold is
//!   replaced by a valid peak-detection estimate when one exists

use crate::config::PolicySettings;
use crate::mission::{ClassicAlgorithm, Mission};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackPolicy {
    partial_window_fallback: bool,
    low_heart_rate_threshold: Option<f32>,
}

impl From<&PolicySettings> for FallbackPolicy {
    fn from(settings: &PolicySettings) -> Self {
        Self {
            partial_window_fallback: settings.partial_window_fallback,
            low_heart_rate_threshold: settings.low_heart_rate_threshold,
        }
    }
}

impl FallbackPolicy {
    pub fn disabled() -> Self {
        Self {
            partial_window_fallback: false,
            low_heart_rate_threshold: None,
        }
    }

    /// Classic algorithm to run instead of a learned model whose window is not yet full
    pub fn partial_window_fallback(&self, mission: Mission) -> Option<ClassicAlgorithm> {
        let algorithm = ClassicAlgorithm::PeakDetection;
        if self.partial_window_fallback && algorithm.supports(mission) {
            Some(algorithm)
        } else {
            None
        }
    }

    /// Cross-check a low learned heart rate against peak detection.
    ///
    /// `corroborate` is only invoked when the correction applies. Returns the
    /// value to use and whether it came from the corroborating estimate.
    pub fn low_value_correction(
        &self,
        mission: Mission,
        learned_value: f32,
        corroborate: impl FnOnce() -> Option<f32>,
    ) -> (f32, bool) {
        let threshold = match (mission, self.low_heart_rate_threshold) {
            (Mission::HeartRate, Some(threshold)) => threshold,
            _ => return (learned_value, false),
        };
        if learned_value >= threshold {
            return (learned_value, false);
        }
        match corroborate() {
            Some(value) if value.is_finite() && value > 0.0 => (value, true),
            _ => (learned_value, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> FallbackPolicy {
        FallbackPolicy::from(&PolicySettings::default())
    }

    #[test]
    fn test_partial_window_fallback() {
        assert_eq!(
            policy().partial_window_fallback(Mission::HeartRate),
            Some(ClassicAlgorithm::PeakDetection)
        );
        assert_eq!(policy().partial_window_fallback(Mission::SpO2), None);
        assert_eq!(FallbackPolicy::disabled().partial_window_fallback(Mission::HeartRate), None);
    }

    #[test]
    fn test_low_heart_rate_prefers_peak_detection() {
        assert_eq!(policy().low_value_correction(Mission::HeartRate, 42.0, || Some(64.0)), (64.0, true));
        // corroboration failed: keep the learned value
        assert_eq!(policy().low_value_correction(Mission::HeartRate, 42.0, || None), (42.0, false));
    }

    #[test]
    fn test_correction_scope() {
        let never = || -> Option<f32> { panic!("must not corroborate") };
        assert_eq!(policy().low_value_correction(Mission::HeartRate, 72.0, never), (72.0, false));
        assert_eq!(policy().low_value_correction(Mission::SpO2, 30.0, never), (30.0, false));
        assert_eq!(
            FallbackPolicy::disabled().low_value_correction(Mission::HeartRate, 30.0, never),
            (30.0, false)
        );
    }
}
