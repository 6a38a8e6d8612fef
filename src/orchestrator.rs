//! # Inference Orchestrator Module
//!
//! The per-mission state machine that turns admitted samples into smoothed,
//! range-validated vital readings.
//!
//! ## Cycle
//! Each mission moves `Idle → Accumulating → Ready → Inferring → Idle`. A
//! mission becomes Ready when its buffer holds the minimum window and its
//! cadence timer has elapsed. A Ready mission then:
//! 1. Resamples and pads each of its channels to the target window
//! 2. Applies the band conditioner (one pass per channel per cycle, shared by
//!    all physiological missions)
//! 3. Runs its bound strategy, or the policy's fallback
//! 4. Discards non-finite, non-positive or out-of-range values
//! 5. Pushes accepted values into its History and emits the weighted mean
//!
//! ## Concurrency
//! `Pipeline` is a single-writer value: every mutation goes through `&mut
//! self`. The `worker` module moves it onto its own thread so the sample
//! producer never waits for an inference.
//!
//! ## Key Types
//! - `Pipeline`: buffers, per-mission state, policy and diagnostics
//! - `VitalReading`: one emitted value with its raw estimate and strategy
//! - `MissionStatus`: read-only snapshot for display

use crate::buffer::{self, Admission, WindowBuffer};
use crate::conditioning;
use crate::config::Config;
use crate::diagnostics::{DiagnosticEvent, Diagnostics, DiscardReason, ResetReason};
use crate::ensemble::Tensor;
use crate::error::{BindingError, EnsembleError};
use crate::estimators;
use crate::mission::{
    Band, Channel, ClassicAlgorithm, EstimationStrategy, Mission, MissionProfile, StrategyTag,
};
use crate::policy::FallbackPolicy;
use crate::sample::{RawSample, SignalQuality};
use crate::smoothing::History;
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionPhase {
    /// No strategy bound, or no sample since the last cycle or reset
    Idle,
    /// Collecting data or waiting for the cadence timer
    Accumulating,
    Ready,
    Inferring,
}

impl fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissionPhase::Idle => "idle",
            MissionPhase::Accumulating => "accumulating",
            MissionPhase::Ready => "ready",
            MissionPhase::Inferring => "inferring",
        };
        write!(f, "{}", name)
    }
}

/// One emitted result
#[derive(Debug, Clone, PartialEq)]
pub struct VitalReading {
    pub mission: Mission,
    /// Smoothed value, clamped into the mission range
    pub value: i32,
    /// The accepted raw estimate of this cycle
    pub raw: f32,
    pub strategy: StrategyTag,
    /// Timestamp of the sample that triggered the cycle
    pub timestamp_ms: u64,
}

impl fmt::Display for VitalReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} (raw {:.1}, {})",
            self.mission,
            self.value,
            self.mission.unit(),
            self.raw,
            self.strategy
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissionStatus {
    pub mission: Mission,
    pub phase: MissionPhase,
    pub strategy: Option<StrategyTag>,
    pub buffered: usize,
    pub capacity: usize,
    pub history_len: usize,
}

struct MissionState {
    strategy: Option<EstimationStrategy>,
    phase: MissionPhase,
    last_cycle_ms: Option<u64>,
    history: History,
    profile: MissionProfile,
}

impl MissionState {
    fn new(profile: MissionProfile) -> Self {
        Self {
            strategy: None,
            phase: MissionPhase::Idle,
            last_cycle_ms: None,
            history: History::default(),
            profile,
        }
    }

    fn cadence_elapsed(&self, now_ms: u64) -> bool {
        match self.last_cycle_ms {
            None => true,
            // transport clock went backwards: treat as a fresh start
            Some(last) if now_ms < last => true,
            Some(last) => now_ms - last >= self.profile.cadence_ms,
        }
    }

    fn clear(&mut self) {
        self.phase = MissionPhase::Idle;
        self.last_cycle_ms = None;
        self.history.clear();
    }
}

/// Conditioned channel windows computed during one cycle
type CycleCache = HashMap<(Band, Channel), Vec<f32>>;

pub struct Pipeline {
    config: Config,
    buffer: WindowBuffer,
    missions: Vec<MissionState>,
    policy: FallbackPolicy,
    diagnostics: Diagnostics,
}

impl Pipeline {
    /// Build a pipeline with the classic bindings named in `config`.
    ///
    /// Incompatible bindings and invalid settings are rejected here, before
    /// any sample is buffered.
    pub fn new(config: &Config) -> Result<Self, BindingError> {
        for mission in Mission::ALL {
            if let Some(algorithm) = config.missions.get(mission).classic {
                EstimationStrategy::Classic(algorithm)
                    .validate_for(mission, config.tensor_shape(mission))?;
            }
        }
        config
            .validate()
            .map_err(|e| BindingError::InvalidSettings(e.to_string()))?;

        let missions = Mission::ALL
            .iter()
            .map(|&mission| {
                let settings = config.missions.get(mission);
                let mut state = MissionState::new(settings.profile());
                state.strategy = settings.classic.map(EstimationStrategy::Classic);
                state
            })
            .collect();

        let buffer = WindowBuffer::new(
            config.source_sample_rate_hz,
            &config.physiological,
            &config.respiratory,
        );

        log::info!(
            "Pipeline created: source rate {} Hz, physiological window {} s, respiratory window {} s",
            config.source_sample_rate_hz,
            config.physiological.window_seconds,
            config.respiratory.window_seconds
        );

        Ok(Self {
            config: config.clone(),
            buffer,
            missions,
            policy: FallbackPolicy::from(&config.policy),
            diagnostics: Diagnostics::new(config.diagnostics),
        })
    }

    /// Bind a strategy during construction
    pub fn with_strategy(
        mut self,
        mission: Mission,
        strategy: EstimationStrategy,
    ) -> Result<Self, BindingError> {
        self.install(mission, strategy)?;
        Ok(self)
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Forward diagnostic lines to `sink`
    pub fn attach_diagnostics(&mut self, sink: Sender<String>) {
        self.diagnostics.attach(sink);
    }

    /// Swap a mission's strategy. Buffers, histories and timers of every
    /// mission are invalidated; a rejected binding changes nothing.
    pub fn rebind(&mut self, mission: Mission, strategy: EstimationStrategy) -> Result<(), BindingError> {
        self.install(mission, strategy)?;
        self.clear_all(ResetReason::Rebind(mission));
        Ok(())
    }

    fn install(&mut self, mission: Mission, strategy: EstimationStrategy) -> Result<(), BindingError> {
        strategy.validate_for(mission, self.config.tensor_shape(mission))?;
        self.diagnostics.emit(DiagnosticEvent::Rebound {
            mission,
            strategy: strategy.tag(),
        });
        self.missions[mission.index()].strategy = Some(strategy);
        Ok(())
    }

    /// Explicit reset: clears all buffers, histories and cadence timers
    pub fn reset(&mut self) {
        self.clear_all(ResetReason::Explicit);
    }

    fn clear_all(&mut self, reason: ResetReason) {
        self.buffer.clear();
        for state in &mut self.missions {
            state.clear();
        }
        self.diagnostics.emit(DiagnosticEvent::Reset { reason });
    }

    /// Apply an asynchronous quality update
    pub fn set_quality(&mut self, quality: SignalQuality) {
        if self.buffer.update_quality(quality) == Admission::Reset {
            self.clear_all(ResetReason::SignalLost);
        }
    }

    /// Offer one sample and run every mission that became Ready.
    pub fn admit(&mut self, sample: &RawSample, quality: SignalQuality) -> Vec<VitalReading> {
        match self.buffer.admit(sample, quality) {
            Admission::Admitted => self.run_cycles(sample),
            Admission::Dropped => Vec::new(),
            Admission::Reset => {
                self.clear_all(ResetReason::SignalLost);
                Vec::new()
            }
        }
    }

    fn run_cycles(&mut self, sample: &RawSample) -> Vec<VitalReading> {
        let now = sample.timestamp_ms;
        let mut cache = CycleCache::new();
        let mut readings = Vec::new();

        for mission in Mission::ALL {
            let index = mission.index();
            if self.missions[index].strategy.is_none() {
                continue;
            }

            let ready = self.has_enough_data(mission) && self.missions[index].cadence_elapsed(now);
            if !ready {
                self.missions[index].phase = MissionPhase::Accumulating;
                continue;
            }

            self.missions[index].phase = MissionPhase::Ready;
            self.diagnostics.emit(DiagnosticEvent::BufferStatus {
                mission,
                fill: self.buffer.fill(mission),
                capacity: self.buffer.capacity(mission.band()),
                accel_magnitude: sample.accel_magnitude(),
            });

            self.missions[index].phase = MissionPhase::Inferring;
            self.missions[index].last_cycle_ms = Some(now);
            if let Some(reading) = self.infer(mission, now, &mut cache) {
                readings.push(reading);
            }
            self.missions[index].phase = MissionPhase::Idle;
        }

        readings
    }

    /// Minimum window, or a full one for learned missions without a fallback
    fn has_enough_data(&self, mission: Mission) -> bool {
        let needs_full_window = matches!(
            self.missions[mission.index()].strategy,
            Some(EstimationStrategy::Learned(_))
        ) && self.policy.partial_window_fallback(mission).is_none();

        if needs_full_window {
            self.buffer.has_full_window(mission)
        } else {
            self.buffer.has_minimum_data(mission)
        }
    }

    fn conditioned(&self, cache: &mut CycleCache, band: Band, channel: Channel) -> Vec<f32> {
        cache
            .entry((band, channel))
            .or_insert_with(|| {
                let window = self.config.window(band);
                let samples = self.buffer.channel(band, channel).to_vec();
                let padded = buffer::resample_with_padding(
                    &samples,
                    window.target_length(),
                    self.config.source_sample_rate_hz,
                    window.target_rate_hz,
                );
                conditioning::condition(&padded, window.target_rate_hz, band)
            })
            .clone()
    }

    fn infer(&mut self, mission: Mission, now: u64, cache: &mut CycleCache) -> Option<VitalReading> {
        let strategy = self.missions[mission.index()].strategy.clone()?;
        let band = mission.band();
        let window = *self.config.window(band);
        let primary = self.conditioned(cache, band, mission.primary_channel());
        let classic = |algorithm: ClassicAlgorithm| {
            estimators::estimate(
                algorithm,
                mission,
                &primary,
                window.target_rate_hz,
                window.welch_segment_size,
            )
        };

        let (raw, tag) = match strategy {
            EstimationStrategy::Classic(algorithm) => (classic(algorithm), StrategyTag::Classic(algorithm)),
            EstimationStrategy::Learned(model) if !self.buffer.has_full_window(mission) => {
                match self.policy.partial_window_fallback(mission) {
                    Some(algorithm) => (classic(algorithm), StrategyTag::Fallback(algorithm)),
                    None => {
                        log::debug!("[{}] partial window and no fallback for {}", mission, model.architecture);
                        self.diagnostics.emit(DiagnosticEvent::Discarded {
                            mission,
                            raw: None,
                            reason: DiscardReason::NoStrategy,
                        });
                        return None;
                    }
                }
            }
            EstimationStrategy::Learned(model) => {
                let channels: Vec<Vec<f32>> = mission
                    .channels()
                    .iter()
                    .map(|&channel| conditioning::normalize(&self.conditioned(cache, band, channel)))
                    .collect();
                let predicted = Tensor::from_channels(&channels)
                    .ok_or(EnsembleError::ShapeMismatch {
                        expected: model.ensemble.input_shape(),
                        actual: (1, 0, channels.len()),
                    })
                    .and_then(|tensor| model.ensemble.predict(&tensor));

                match predicted {
                    Ok(value) => {
                        let (value, corrected) = self.policy.low_value_correction(mission, value, || {
                            classic(ClassicAlgorithm::PeakDetection)
                        });
                        if corrected {
                            (Some(value), StrategyTag::Fallback(ClassicAlgorithm::PeakDetection))
                        } else {
                            (Some(value), StrategyTag::Learned(model.architecture.clone()))
                        }
                    }
                    Err(error) => {
                        self.diagnostics.emit(DiagnosticEvent::ModelFailure { mission, error });
                        return None;
                    }
                }
            }
        };

        self.diagnostics.emit(DiagnosticEvent::StrategyChosen {
            mission,
            strategy: tag.clone(),
        });

        let state = &mut self.missions[mission.index()];
        let raw = match raw {
            Some(raw) if state.profile.accepts(raw) => raw,
            Some(raw) => {
                self.diagnostics.emit(DiagnosticEvent::Discarded {
                    mission,
                    raw: Some(raw),
                    reason: DiscardReason::OutOfRange,
                });
                return None;
            }
            None => {
                self.diagnostics.emit(DiagnosticEvent::Discarded {
                    mission,
                    raw: None,
                    reason: DiscardReason::Inconclusive,
                });
                return None;
            }
        };

        state.history.push(raw);
        let value = state.profile.clamp(state.history.smoothed()?);

        Some(VitalReading {
            mission,
            value,
            raw,
            strategy: tag,
            timestamp_ms: now,
        })
    }

    pub fn phase(&self, mission: Mission) -> MissionPhase {
        self.missions[mission.index()].phase
    }

    pub fn history_len(&self, mission: Mission) -> usize {
        self.missions[mission.index()].history.len()
    }

    pub fn has_minimum_data(&self, mission: Mission) -> bool {
        self.buffer.has_minimum_data(mission)
    }

    pub fn strategy(&self, mission: Mission) -> Option<&EstimationStrategy> {
        self.missions[mission.index()].strategy.as_ref()
    }

    pub fn quality(&self) -> SignalQuality {
        self.buffer.quality()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> Vec<MissionStatus> {
        Mission::ALL
            .iter()
            .map(|&mission| {
                let state = &self.missions[mission.index()];
                MissionStatus {
                    mission,
                    phase: state.phase,
                    strategy: state.strategy.as_ref().map(EstimationStrategy::tag),
                    buffered: self.buffer.fill(mission),
                    capacity: self.buffer.capacity(mission.band()),
                    history_len: state.history.len(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{ModelEnsemble, ModelOutput};
    use crate::error::ModelError;
    use std::f32::consts::PI;

    const RATE: f32 = 25.0;

    /// Green carries a pulse at `hr_hz`, IR a breathing wave at `rr_hz`
    fn sample(i: u64, hr_hz: f32, rr_hz: f32) -> RawSample {
        let t = i as f32 / RATE;
        RawSample::new(
            1000.0 + 50.0 * (2.0 * PI * hr_hz * t).sin(),
            800.0 + 20.0 * (2.0 * PI * hr_hz * t).sin(),
            1200.0 + 30.0 * (2.0 * PI * rr_hz * t).sin(),
            i * 40,
        )
    }

    fn feed(pipeline: &mut Pipeline, range: std::ops::Range<u64>, hr_hz: f32, rr_hz: f32) -> Vec<VitalReading> {
        range
            .flat_map(|i| pipeline.admit(&sample(i, hr_hz, rr_hz), SignalQuality::Good))
            .collect()
    }

    fn of(readings: &[VitalReading], mission: Mission) -> Vec<VitalReading> {
        readings.iter().filter(|r| r.mission == mission).cloned().collect()
    }

    fn learned(config: &Config, mission: Mission, value: f32) -> EstimationStrategy {
        let ensemble = ModelEnsemble::new(config.tensor_shape(mission))
            .with_fold(move |_: &Tensor| -> Result<ModelOutput, ModelError> { Ok(ModelOutput::Scalar(value)) });
        EstimationStrategy::learned("cnn", ensemble)
    }

    #[test]
    fn test_classic_heart_rate() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        let readings = of(&feed(&mut pipeline, 0..400, 1.2, 0.25), Mission::HeartRate);

        assert!(!readings.is_empty());
        for reading in &readings {
            assert!((reading.value - 72).abs() <= 5, "HR {}", reading.value);
            assert_eq!(reading.strategy, StrategyTag::Classic(ClassicAlgorithm::PeakDetection));
        }
    }

    #[test]
    fn test_classic_respiration_rate() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        let readings = of(&feed(&mut pipeline, 0..900, 1.2, 0.25), Mission::RespirationRate);

        assert!(!readings.is_empty());
        let last = readings.last().unwrap();
        assert!((last.value - 15).abs() <= 3, "RR {}", last.value);
        assert_eq!(last.strategy, StrategyTag::Classic(ClassicAlgorithm::FftDominantFrequency));
    }

    #[test]
    fn test_non_finite_sample_does_not_fabricate_readings() {
        let mut pipeline = Pipeline::new(&Config::default())
            .unwrap()
            .with_strategy(
                Mission::HeartRate,
                EstimationStrategy::Classic(ClassicAlgorithm::FftDominantFrequency),
            )
            .unwrap();

        let mut readings = feed(&mut pipeline, 0..500, 1.2, 0.25);
        let mut broken = sample(500, 1.2, 0.25);
        broken.ir = f32::NAN;
        broken.green = f32::NAN;
        readings.extend(pipeline.admit(&broken, SignalQuality::Good));
        readings.extend(feed(&mut pipeline, 501..900, 1.2, 0.25));

        let after: Vec<&VitalReading> = readings.iter().filter(|r| r.timestamp_ms >= 500 * 40).collect();
        let breaths: Vec<&&VitalReading> = after.iter().filter(|r| r.mission == Mission::RespirationRate).collect();
        let beats: Vec<&&VitalReading> = after.iter().filter(|r| r.mission == Mission::HeartRate).collect();
        assert!(!breaths.is_empty());
        assert!(!beats.is_empty());
        for reading in breaths {
            assert!((reading.raw - 15.0).abs() <= 4.0, "RR raw {}", reading.raw);
            assert!((reading.value - 15).abs() <= 4, "RR {}", reading.value);
        }
        for reading in beats {
            assert!((reading.raw - 72.0).abs() <= 8.0, "HR raw {}", reading.raw);
            assert!((reading.value - 72).abs() <= 8, "HR {}", reading.value);
        }
    }

    #[test]
    fn test_nothing_before_minimum_window() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        // 4 s minimum at 25 Hz is 100 samples
        assert!(feed(&mut pipeline, 0..99, 1.2, 0.25).is_empty());
        assert_eq!(pipeline.phase(Mission::HeartRate), MissionPhase::Accumulating);
        assert_eq!(pipeline.phase(Mission::SpO2), MissionPhase::Idle);
        let first = of(&feed(&mut pipeline, 99..100, 1.2, 0.25), Mission::HeartRate);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].timestamp_ms, 99 * 40);
    }

    #[test]
    fn test_cadence_respected() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        let readings = of(&feed(&mut pipeline, 0..600, 1.2, 0.25), Mission::HeartRate);

        assert!(readings.len() >= 5);
        for pair in readings.windows(2) {
            assert!(pair[1].timestamp_ms - pair[0].timestamp_ms >= 2000);
        }
    }

    #[test]
    fn test_quality_reset_clears_state() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        feed(&mut pipeline, 0..400, 1.2, 0.25);
        assert!(pipeline.has_minimum_data(Mission::HeartRate));
        assert!(pipeline.history_len(Mission::HeartRate) > 0);

        pipeline.set_quality(SignalQuality::NoSignal);

        for mission in Mission::ALL {
            assert!(!pipeline.has_minimum_data(mission));
            assert_eq!(pipeline.history_len(mission), 0);
            assert_eq!(pipeline.phase(mission), MissionPhase::Idle);
        }
    }

    #[test]
    fn test_no_signal_sample_resets_and_poor_is_dropped() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        feed(&mut pipeline, 0..150, 1.2, 0.25);

        assert!(pipeline.admit(&sample(150, 1.2, 0.25), SignalQuality::Poor).is_empty());
        assert_eq!(pipeline.status()[0].buffered, 150);

        pipeline.admit(&sample(151, 1.2, 0.25), SignalQuality::NoSignal);
        assert!(pipeline.status().iter().all(|s| s.buffered == 0 && s.history_len == 0));

        // timers were cleared too: the first cycle after recovery is not delayed
        let readings = of(&feed(&mut pipeline, 200..300, 1.2, 0.25), Mission::HeartRate);
        assert_eq!(readings.first().map(|r| r.timestamp_ms), Some(299 * 40));
    }

    #[test]
    fn test_out_of_range_never_reaches_history() {
        let config = Config::default();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut pipeline = Pipeline::new(&config)
            .unwrap()
            .with_strategy(Mission::SpO2, learned(&config, Mission::SpO2, 45.0))
            .unwrap();
        pipeline.attach_diagnostics(tx);

        let readings = feed(&mut pipeline, 0..400, 1.2, 0.25);

        assert!(of(&readings, Mission::SpO2).is_empty());
        assert_eq!(pipeline.history_len(Mission::SpO2), 0);
        let lines: Vec<String> = rx.try_iter().collect();
        assert!(lines.iter().any(|l| l == "[SpO2] discarded 45.0: out of range"));
    }

    #[test]
    fn test_learned_spo2_waits_for_full_window() {
        let config = Config::default();
        let mut pipeline = Pipeline::new(&config)
            .unwrap()
            .with_strategy(Mission::SpO2, learned(&config, Mission::SpO2, 97.0))
            .unwrap();

        assert!(of(&feed(&mut pipeline, 0..199, 1.2, 0.25), Mission::SpO2).is_empty());
        let readings = of(&feed(&mut pipeline, 199..400, 1.2, 0.25), Mission::SpO2);

        assert_eq!(readings[0].timestamp_ms, 199 * 40);
        assert!(readings.iter().all(|r| r.value == 97));
        assert_eq!(readings[0].strategy, StrategyTag::Learned("cnn".to_string()));
    }

    #[test]
    fn test_model_receives_normalized_interleaved_tensor() {
        let config = Config::default();
        let ensemble = ModelEnsemble::new(config.tensor_shape(Mission::SystolicBp)).with_fold(
            |tensor: &Tensor| -> Result<ModelOutput, ModelError> {
                let (_, length, channels) = tensor.shape();
                let mean = tensor.data().iter().sum::<f32>() / (length * channels) as f32;
                if channels == 2 && mean.abs() < 1e-3 {
                    Ok(ModelOutput::Sequence(vec![0.0, 118.0]))
                } else {
                    Err(ModelError::Malformed(format!("unexpected tensor, mean {}", mean)))
                }
            },
        );
        let mut pipeline = Pipeline::new(&config)
            .unwrap()
            .with_strategy(Mission::SystolicBp, EstimationStrategy::learned("lstm", ensemble))
            .unwrap();

        let readings = of(&feed(&mut pipeline, 0..250, 1.2, 0.25), Mission::SystolicBp);
        assert!(!readings.is_empty());
        assert!(readings.iter().all(|r| r.value == 118));
    }

    #[test]
    fn test_partial_window_uses_peak_detection() {
        let config = Config::default();
        let mut pipeline = Pipeline::new(&config)
            .unwrap()
            .with_strategy(Mission::HeartRate, learned(&config, Mission::HeartRate, 65.0))
            .unwrap();

        let partial = of(&feed(&mut pipeline, 0..199, 1.2, 0.25), Mission::HeartRate);
        assert!(!partial.is_empty());
        assert!(partial
            .iter()
            .all(|r| r.strategy == StrategyTag::Fallback(ClassicAlgorithm::PeakDetection)));

        let full = of(&feed(&mut pipeline, 199..400, 1.2, 0.25), Mission::HeartRate);
        assert!(!full.is_empty());
        assert!(full.iter().all(|r| r.strategy == StrategyTag::Learned("cnn".to_string())));
        assert!(matches!(pipeline.strategy(Mission::HeartRate), Some(EstimationStrategy::Learned(_))));
    }

    #[test]
    fn test_low_learned_heart_rate_is_corroborated() {
        let config = Config::default();
        let mut pipeline = Pipeline::new(&config)
            .unwrap()
            .with_strategy(Mission::HeartRate, learned(&config, Mission::HeartRate, 35.0))
            .unwrap();

        let readings = of(&feed(&mut pipeline, 0..400, 1.2, 0.25), Mission::HeartRate);
        let full: Vec<&VitalReading> = readings.iter().filter(|r| r.timestamp_ms >= 199 * 40).collect();
        assert!(!full.is_empty());
        for reading in full {
            assert_eq!(reading.strategy, StrategyTag::Fallback(ClassicAlgorithm::PeakDetection));
            assert!((reading.raw - 72.0).abs() <= 5.0);
        }
    }

    #[test]
    fn test_disabled_policy() {
        let config = Config::default();
        let mut pipeline = Pipeline::new(&config)
            .unwrap()
            .with_strategy(Mission::HeartRate, learned(&config, Mission::HeartRate, 35.0))
            .unwrap()
            .with_policy(FallbackPolicy::disabled());

        // no fallback while partial, and 35 BPM is out of range once full
        let readings = feed(&mut pipeline, 0..400, 1.2, 0.25);
        assert!(of(&readings, Mission::HeartRate).is_empty());
    }

    #[test]
    fn test_all_folds_failing_skips_cycle() {
        let config = Config::default();
        let ensemble = ModelEnsemble::new(config.tensor_shape(Mission::DiastolicBp))
            .with_fold(|_: &Tensor| -> Result<ModelOutput, ModelError> { Err(ModelError::Failed("io".into())) });
        let mut pipeline = Pipeline::new(&config)
            .unwrap()
            .with_strategy(Mission::DiastolicBp, EstimationStrategy::learned("cnn", ensemble))
            .unwrap();

        let readings = feed(&mut pipeline, 0..300, 1.2, 0.25);
        assert!(of(&readings, Mission::DiastolicBp).is_empty());
        assert!(!of(&readings, Mission::HeartRate).is_empty());
    }

    #[test]
    fn test_incompatible_bindings_rejected() {
        let config = Config::default();
        let mut pipeline = Pipeline::new(&config).unwrap();

        assert_eq!(
            pipeline.rebind(Mission::SpO2, EstimationStrategy::Classic(ClassicAlgorithm::PeakDetection)),
            Err(BindingError::IncompatibleClassic {
                mission: Mission::SpO2,
                algorithm: ClassicAlgorithm::PeakDetection,
            })
        );
        assert_eq!(
            pipeline.rebind(
                Mission::HeartRate,
                EstimationStrategy::learned("cnn", ModelEnsemble::new(config.tensor_shape(Mission::HeartRate)))
            ),
            Err(BindingError::EmptyEnsemble {
                mission: Mission::HeartRate
            })
        );
        assert!(matches!(
            pipeline.rebind(Mission::SystolicBp, learned(&config, Mission::HeartRate, 120.0)),
            Err(BindingError::ShapeMismatch { .. })
        ));

        let mut bad = Config::default();
        bad.missions.diastolic_bp.classic = Some(ClassicAlgorithm::FftDominantFrequency);
        assert!(matches!(
            Pipeline::new(&bad),
            Err(BindingError::IncompatibleClassic {
                mission: Mission::DiastolicBp,
                ..
            })
        ));
    }

    #[test]
    fn test_rebind_invalidates_buffers_and_histories() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        feed(&mut pipeline, 0..300, 1.2, 0.25);
        assert!(pipeline.history_len(Mission::HeartRate) > 0);

        pipeline
            .rebind(
                Mission::HeartRate,
                EstimationStrategy::Classic(ClassicAlgorithm::FftDominantFrequency),
            )
            .unwrap();

        assert!(!pipeline.has_minimum_data(Mission::HeartRate));
        assert_eq!(pipeline.history_len(Mission::HeartRate), 0);

        let readings = of(&feed(&mut pipeline, 300..500, 1.2, 0.25), Mission::HeartRate);
        assert!(!readings.is_empty());
        assert!(readings
            .iter()
            .all(|r| r.strategy == StrategyTag::Classic(ClassicAlgorithm::FftDominantFrequency)));
    }

    #[test]
    fn test_explicit_reset_and_status() {
        let mut pipeline = Pipeline::new(&Config::default()).unwrap();
        feed(&mut pipeline, 0..120, 1.2, 0.25);

        let status = pipeline.status();
        assert_eq!(status.len(), 5);
        assert_eq!(status[0].mission, Mission::HeartRate);
        assert_eq!(status[0].capacity, 200);
        assert_eq!(status[4].capacity, 750);
        assert_eq!(status[3].strategy, None);

        pipeline.reset();
        assert!(pipeline.status().iter().all(|s| s.buffered == 0 && s.history_len == 0));
        assert_eq!(pipeline.quality(), SignalQuality::Good);
    }
}
