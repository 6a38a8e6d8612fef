//! # ring-vitals
//!
//! Real-time vital-signs inference for a PPG ring: heart rate, systolic and
//! diastolic blood pressure, SpO2 and respiration rate, estimated from a live
//! optical + inertial sample stream.
//!
//! Samples flow `WindowBuffer` → `Pipeline` cadence check → conditioning →
//! classic estimator or model ensemble → range validation → smoothing →
//! `VitalReading`.

pub mod buffer;
pub mod conditioning;
pub mod config;
pub mod diagnostics;
pub mod ensemble;
pub mod error;
pub mod estimators;
pub mod mission;
pub mod orchestrator;
pub mod policy;
pub mod sample;
pub mod smoothing;
pub mod spectral;
pub mod worker;

pub use config::Config;
pub use ensemble::{FoldModel, ModelEnsemble, ModelOutput, Tensor};
pub use error::{BindingError, ConfigError, EnsembleError, ModelError, WorkerError};
pub use mission::{ClassicAlgorithm, EstimationStrategy, Mission, StrategyTag};
pub use orchestrator::{MissionPhase, MissionStatus, Pipeline, VitalReading};
pub use sample::{RawSample, SignalQuality};
pub use worker::{PipelineWorker, ResultRouter, WorkerHandle};
