//! # Window Buffer Module
//!
//! Per-channel bounded FIFO buffers behind a signal-quality gate.
//!
//! ## Layout
//! - Physiological window: green, red and IR channels, shared by HR, SYS,
//!   DIA and SpO2
//! - Respiratory window: a separate, longer IR buffer for RR
//!
//! Every buffer is capped at `window_seconds * source_rate` samples; the
//! oldest sample is evicted on overflow.
//!
//! ## Resampling
//! `resample_with_padding` linearly interpolates a buffer to the target rate.
//! When the buffer holds less than a full target window, the resampled
//! sequence is tiled (repeated, not zero-padded) up to the target length.
//! Tiling leaves an artificial periodicity at each tile boundary.

use crate::config::WindowSettings;
use crate::mission::{Band, Channel, Mission};
use crate::sample::{RawSample, SignalQuality};
use std::collections::VecDeque;

/// Bounded FIFO of scalar samples for one channel
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl ChannelBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.capacity == 0 {
            return;
        }
        self.samples.push_back(value);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Oldest-to-newest copy of the buffered samples
    pub fn to_vec(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
    }

    /// Most recent `n` samples (fewer if the buffer is shorter)
    pub fn last_samples(&self, n: usize) -> Vec<f32> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }
}

/// Outcome of offering a sample to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Appended to every relevant channel buffer
    Admitted,
    /// Rejected by the quality gate, buffers untouched
    Dropped,
    /// Quality fell to NoSignal; all buffers were cleared
    Reset,
}

/// Fill thresholds of one band, in source samples
#[derive(Debug, Clone, Copy, PartialEq)]
struct BandLimits {
    min_samples: usize,
    full_samples: usize,
}

impl BandLimits {
    fn new(settings: &WindowSettings, source_rate: f32) -> Self {
        let full_samples = settings.capacity(source_rate);
        Self {
            min_samples: settings.min_samples(source_rate).min(full_samples),
            full_samples,
        }
    }
}

pub struct WindowBuffer {
    green: ChannelBuffer,
    red: ChannelBuffer,
    ir: ChannelBuffer,
    respiratory_ir: ChannelBuffer,
    physiological: BandLimits,
    respiratory: BandLimits,
    last_quality: SignalQuality,
}

impl WindowBuffer {
    pub fn new(source_rate: f32, physiological: &WindowSettings, respiratory: &WindowSettings) -> Self {
        let physiological = BandLimits::new(physiological, source_rate);
        let respiratory = BandLimits::new(respiratory, source_rate);
        Self {
            green: ChannelBuffer::new(physiological.full_samples),
            red: ChannelBuffer::new(physiological.full_samples),
            ir: ChannelBuffer::new(physiological.full_samples),
            respiratory_ir: ChannelBuffer::new(respiratory.full_samples),
            physiological,
            respiratory,
            last_quality: SignalQuality::NoSignal,
        }
    }

    /// Offer one sample under the given quality classification.
    ///
    /// Fair-or-better samples are appended; anything worse is dropped, as is
    /// a sample with a non-finite optical reading. A transition into
    /// `NoSignal` clears every buffer and reports `Reset`.
    pub fn admit(&mut self, sample: &RawSample, quality: SignalQuality) -> Admission {
        if self.update_quality(quality) == Admission::Reset {
            return Admission::Reset;
        }
        if !quality.admits_samples() {
            return Admission::Dropped;
        }
        if !(sample.green.is_finite() && sample.red.is_finite() && sample.ir.is_finite()) {
            log::debug!("Dropped non-finite sample at {} ms", sample.timestamp_ms);
            return Admission::Dropped;
        }

        self.green.push(sample.green);
        self.red.push(sample.red);
        self.ir.push(sample.ir);
        self.respiratory_ir.push(sample.ir);
        Admission::Admitted
    }

    /// Record a quality change without a sample attached.
    ///
    /// Returns `Reset` on a transition into `NoSignal`, `Dropped` otherwise.
    pub fn update_quality(&mut self, quality: SignalQuality) -> Admission {
        let entered_no_signal = quality == SignalQuality::NoSignal && self.last_quality != SignalQuality::NoSignal;
        self.last_quality = quality;
        if entered_no_signal {
            self.clear();
            Admission::Reset
        } else {
            Admission::Dropped
        }
    }

    pub fn quality(&self) -> SignalQuality {
        self.last_quality
    }

    pub fn clear(&mut self) {
        self.green.clear();
        self.red.clear();
        self.ir.clear();
        self.respiratory_ir.clear();
    }

    pub fn channel(&self, band: Band, channel: Channel) -> &ChannelBuffer {
        match (band, channel) {
            (Band::Respiratory, _) => &self.respiratory_ir,
            (Band::Physiological, Channel::Green) => &self.green,
            (Band::Physiological, Channel::Red) => &self.red,
            (Band::Physiological, Channel::Ir) => &self.ir,
        }
    }

    /// Samples currently held for the mission's channels
    pub fn fill(&self, mission: Mission) -> usize {
        mission
            .channels()
            .iter()
            .map(|&channel| self.channel(mission.band(), channel).len())
            .min()
            .unwrap_or(0)
    }

    pub fn has_minimum_data(&self, mission: Mission) -> bool {
        self.fill(mission) >= self.limits(mission.band()).min_samples
    }

    pub fn has_full_window(&self, mission: Mission) -> bool {
        self.fill(mission) >= self.limits(mission.band()).full_samples
    }

    pub fn capacity(&self, band: Band) -> usize {
        self.limits(band).full_samples
    }

    fn limits(&self, band: Band) -> BandLimits {
        match band {
            Band::Physiological => self.physiological,
            Band::Respiratory => self.respiratory,
        }
    }
}

/// Linear interpolation of `samples` from `source_rate` to `target_rate`.
///
/// Output length is `floor(len * target_rate / source_rate)` (at least one
/// sample for non-empty input); output sample `i` sits at source position
/// `i * source_rate / target_rate`.
pub fn resample_linear(samples: &[f32], source_rate: f32, target_rate: f32) -> Vec<f32> {
    if samples.is_empty() || source_rate <= 0.0 || target_rate <= 0.0 {
        return Vec::new();
    }

    let ratio = f64::from(source_rate) / f64::from(target_rate);
    let out_len = ((samples.len() as f64 / ratio).floor() as usize).max(1);
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let lower = (position.floor() as usize).min(last);
            let upper = (lower + 1).min(last);
            let progress = position - lower as f64;
            let p1 = f64::from(samples[lower]);
            let p2 = f64::from(samples[upper]);
            (p1 + (p2 - p1) * progress) as f32
        })
        .collect()
}

/// Resample to `target_rate` and fit exactly `target_length` samples.
///
/// With enough data the most recent `target_length` resampled samples are
/// returned unchanged. Otherwise the shorter sequence is repeated from its
/// start until `target_length` is reached.
pub fn resample_with_padding(
    samples: &[f32],
    target_length: usize,
    source_rate: f32,
    target_rate: f32,
) -> Vec<f32> {
    let resampled = resample_linear(samples, source_rate, target_rate);
    if resampled.is_empty() || target_length == 0 {
        return Vec::new();
    }

    if resampled.len() >= target_length {
        return resampled[resampled.len() - target_length..].to_vec();
    }

    resampled.iter().copied().cycle().take(target_length).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn buffer() -> WindowBuffer {
        let config = Config::default();
        WindowBuffer::new(
            config.source_sample_rate_hz,
            &config.physiological,
            &config.respiratory,
        )
    }

    fn sample(i: u64) -> RawSample {
        RawSample::new(i as f32, 2.0 * i as f32, 3.0 * i as f32, i * 40)
    }

    #[test]
    fn test_channel_buffer_evicts_oldest() {
        let mut channel = ChannelBuffer::new(3);
        for v in 0..5 {
            channel.push(v as f32);
        }
        assert_eq!(channel.to_vec(), vec![2.0, 3.0, 4.0]);
        assert_eq!(channel.last_samples(2), vec![3.0, 4.0]);
        assert_eq!(channel.last_samples(10).len(), 3);
    }

    #[test]
    fn test_buffer_bound_invariant() {
        let mut buffer = buffer();
        let physio_cap = buffer.capacity(Band::Physiological);
        let resp_cap = buffer.capacity(Band::Respiratory);
        assert_eq!(physio_cap, 200);
        assert_eq!(resp_cap, 750);

        for i in 0..2000 {
            let quality = if i % 7 == 0 { SignalQuality::Poor } else { SignalQuality::Good };
            buffer.admit(&sample(i), quality);
            for channel in Channel::ALL {
                assert!(buffer.channel(Band::Physiological, channel).len() <= physio_cap);
            }
            assert!(buffer.channel(Band::Respiratory, Channel::Ir).len() <= resp_cap);
        }
        assert!(buffer.has_full_window(Mission::RespirationRate));
    }

    #[test]
    fn test_quality_gate() {
        let mut buffer = buffer();
        assert_eq!(buffer.admit(&sample(1), SignalQuality::Poor), Admission::Dropped);
        assert_eq!(buffer.fill(Mission::HeartRate), 0);
        assert_eq!(buffer.admit(&sample(2), SignalQuality::Fair), Admission::Admitted);
        assert_eq!(buffer.fill(Mission::HeartRate), 1);
        assert_eq!(buffer.fill(Mission::RespirationRate), 1);
    }

    #[test]
    fn test_no_signal_transition_resets() {
        let mut buffer = buffer();
        for i in 0..150 {
            buffer.admit(&sample(i), SignalQuality::Good);
        }
        assert!(buffer.has_minimum_data(Mission::HeartRate));

        assert_eq!(buffer.admit(&sample(151), SignalQuality::NoSignal), Admission::Reset);
        for mission in Mission::ALL {
            assert!(!buffer.has_minimum_data(mission));
            assert_eq!(buffer.fill(mission), 0);
        }
        // staying in NoSignal is a plain drop, not a second reset
        assert_eq!(buffer.admit(&sample(152), SignalQuality::NoSignal), Admission::Dropped);
    }

    #[test]
    fn test_non_finite_samples_are_dropped() {
        let mut buffer = buffer();
        for i in 0..10 {
            buffer.admit(&sample(i), SignalQuality::Good);
        }
        let mut bad = sample(10);
        bad.ir = f32::NAN;
        assert_eq!(buffer.admit(&bad, SignalQuality::Good), Admission::Dropped);
        bad = sample(11);
        bad.green = f32::INFINITY;
        assert_eq!(buffer.admit(&bad, SignalQuality::Good), Admission::Dropped);

        assert_eq!(buffer.fill(Mission::HeartRate), 10);
        assert_eq!(buffer.fill(Mission::RespirationRate), 10);
        for channel in Channel::ALL {
            let values = buffer.channel(Band::Physiological, channel).to_vec();
            assert!(values.iter().all(|v| v.is_finite()));
        }

        // a NoSignal transition still resets even when the sample is malformed
        assert_eq!(buffer.admit(&bad, SignalQuality::NoSignal), Admission::Reset);
        assert_eq!(buffer.fill(Mission::HeartRate), 0);
    }

    #[test]
    fn test_minimum_and_full_thresholds() {
        let mut buffer = buffer();
        for i in 0..99 {
            buffer.admit(&sample(i), SignalQuality::Excellent);
        }
        assert!(!buffer.has_minimum_data(Mission::HeartRate));
        buffer.admit(&sample(99), SignalQuality::Excellent);
        assert!(buffer.has_minimum_data(Mission::SpO2));
        assert!(!buffer.has_full_window(Mission::SpO2));
        assert!(!buffer.has_minimum_data(Mission::RespirationRate));
    }

    #[test]
    fn test_resample_identity_rate() {
        let samples: Vec<f32> = (0..10).map(|v| v as f32).collect();
        assert_eq!(resample_linear(&samples, 25.0, 25.0), samples);
    }

    #[test]
    fn test_resample_downsample_interpolates() {
        let samples: Vec<f32> = (0..10).map(|v| v as f32).collect();
        let resampled = resample_linear(&samples, 25.0, 10.0);
        assert_eq!(resampled.len(), 4);
        assert!((resampled[1] - 2.5).abs() < 1e-6);
        assert!((resampled[3] - 7.5).abs() < 1e-6);
    }

    #[test]
    fn test_resample_with_sufficient_data_is_interpolation_only() {
        let samples: Vec<f32> = (0..750).map(|v| (v as f32 * 0.1).sin()).collect();
        let first = resample_with_padding(&samples, 300, 25.0, 10.0);
        let second = resample_with_padding(&samples, 300, 25.0, 10.0);
        assert_eq!(first, second);
        assert_eq!(first.len(), 300);

        let plain = resample_linear(&samples, 25.0, 10.0);
        assert_eq!(first, plain[plain.len() - 300..].to_vec());
    }

    #[test]
    fn test_resample_tiles_short_window() {
        let samples = vec![1.0, 2.0, 3.0];
        let padded = resample_with_padding(&samples, 8, 25.0, 25.0);
        assert_eq!(padded, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0]);
        assert!(resample_with_padding(&[], 8, 25.0, 25.0).is_empty());
    }
}
