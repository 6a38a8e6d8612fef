//! # Missions and Estimation Strategies
//!
//! A mission is one physiological quantity the pipeline estimates. Each
//! mission reads a fixed set of optical channels from one of two buffer
//! bands and is bound to exactly one `EstimationStrategy`.
//!
//! ## Key Types
//! - `Mission`: HR, SYS, DIA, SpO2, RR
//! - `Band`: which buffer window (physiological or respiratory) a mission reads
//! - `Channel`: optical channel (green, red, IR)
//! - `ClassicAlgorithm` / `EstimationStrategy`: how a raw value is produced
//! - `MissionProfile`: cadence and valid output range

use crate::ensemble::ModelEnsemble;
use crate::error::BindingError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mission {
    HeartRate,
    SystolicBp,
    DiastolicBp,
    SpO2,
    RespirationRate,
}

impl Mission {
    pub const ALL: [Mission; 5] = [
        Mission::HeartRate,
        Mission::SystolicBp,
        Mission::DiastolicBp,
        Mission::SpO2,
        Mission::RespirationRate,
    ];

    /// Buffer window this mission reads from
    pub fn band(&self) -> Band {
        match self {
            Mission::RespirationRate => Band::Respiratory,
            _ => Band::Physiological,
        }
    }

    pub fn is_physiological(&self) -> bool {
        self.band() == Band::Physiological
    }

    /// Channels packed into the model tensor, in interleave order
    pub fn channels(&self) -> &'static [Channel] {
        match self {
            Mission::HeartRate => &[Channel::Green],
            Mission::SystolicBp | Mission::DiastolicBp => &[Channel::Green, Channel::Ir],
            Mission::SpO2 => &[Channel::Red, Channel::Ir],
            Mission::RespirationRate => &[Channel::Ir],
        }
    }

    /// Channel the classic estimators analyse
    pub fn primary_channel(&self) -> Channel {
        self.channels()[0]
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Mission::HeartRate => "bpm",
            Mission::SystolicBp | Mission::DiastolicBp => "mmHg",
            Mission::SpO2 => "%",
            Mission::RespirationRate => "br/min",
        }
    }

    /// Index into fixed per-mission arrays
    pub(crate) fn index(&self) -> usize {
        match self {
            Mission::HeartRate => 0,
            Mission::SystolicBp => 1,
            Mission::DiastolicBp => 2,
            Mission::SpO2 => 3,
            Mission::RespirationRate => 4,
        }
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mission::HeartRate => "HR",
            Mission::SystolicBp => "SYS",
            Mission::DiastolicBp => "DIA",
            Mission::SpO2 => "SpO2",
            Mission::RespirationRate => "RR",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    /// Short window shared by HR, SYS, DIA and SpO2
    Physiological,
    /// Long IR-only window for respiration
    Respiratory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Green,
    Red,
    Ir,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Green, Channel::Red, Channel::Ir];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassicAlgorithm {
    PeakDetection,
    FftDominantFrequency,
}

impl ClassicAlgorithm {
    /// Both algorithms have a heart-rate and a respiration variant only
    pub fn supports(&self, mission: Mission) -> bool {
        matches!(mission, Mission::HeartRate | Mission::RespirationRate)
    }
}

impl fmt::Display for ClassicAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassicAlgorithm::PeakDetection => write!(f, "peak_detection"),
            ClassicAlgorithm::FftDominantFrequency => write!(f, "fft_dominant_frequency"),
        }
    }
}

/// A learned strategy: one architecture, several folds averaged together
#[derive(Debug, Clone)]
pub struct LearnedModel {
    pub architecture: String,
    pub ensemble: ModelEnsemble,
}

#[derive(Debug, Clone)]
pub enum EstimationStrategy {
    Learned(LearnedModel),
    Classic(ClassicAlgorithm),
}

impl EstimationStrategy {
    pub fn learned(architecture: impl Into<String>, ensemble: ModelEnsemble) -> Self {
        EstimationStrategy::Learned(LearnedModel {
            architecture: architecture.into(),
            ensemble,
        })
    }

    /// Reject bindings that can never produce a value for `mission`.
    ///
    /// `tensor_shape` is the `(1, windowLength, channelCount)` shape the
    /// pipeline will hand to a learned model for this mission.
    pub fn validate_for(
        &self,
        mission: Mission,
        tensor_shape: (usize, usize, usize),
    ) -> Result<(), BindingError> {
        match self {
            EstimationStrategy::Classic(algorithm) => {
                if algorithm.supports(mission) {
                    Ok(())
                } else {
                    Err(BindingError::IncompatibleClassic {
                        mission,
                        algorithm: *algorithm,
                    })
                }
            }
            EstimationStrategy::Learned(model) => {
                if model.ensemble.is_empty() {
                    return Err(BindingError::EmptyEnsemble { mission });
                }
                if model.ensemble.input_shape() != tensor_shape {
                    return Err(BindingError::ShapeMismatch {
                        mission,
                        pipeline: tensor_shape,
                        ensemble: model.ensemble.input_shape(),
                    });
                }
                Ok(())
            }
        }
    }

    pub fn tag(&self) -> StrategyTag {
        match self {
            EstimationStrategy::Learned(model) => StrategyTag::Learned(model.architecture.clone()),
            EstimationStrategy::Classic(algorithm) => StrategyTag::Classic(*algorithm),
        }
    }
}

/// Which strategy actually produced a given raw value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyTag {
    Learned(String),
    Classic(ClassicAlgorithm),
    /// Peak detection standing in for a learned binding for one cycle
    Fallback(ClassicAlgorithm),
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyTag::Learned(architecture) => write!(f, "learned:{}", architecture),
            StrategyTag::Classic(algorithm) => write!(f, "classic:{}", algorithm),
            StrategyTag::Fallback(algorithm) => write!(f, "fallback:{}", algorithm),
        }
    }
}

/// Cadence and plausibility range of one mission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionProfile {
    pub cadence_ms: u64,
    pub min_value: f32,
    pub max_value: f32,
}

impl MissionProfile {
    pub fn accepts(&self, value: f32) -> bool {
        value.is_finite() && value > 0.0 && value >= self.min_value && value <= self.max_value
    }

    /// Clamp to the integer range inside `[min_value, max_value]`. When that
    /// range holds no integer the lower bound wins.
    pub fn clamp(&self, value: i32) -> i32 {
        let low = self.min_value.ceil() as i32;
        let high = self.max_value.floor() as i32;
        value.min(high).max(low)
    }
}
