//! # Classic Estimators Module
//!
//! Deterministic rate estimators for heart rate and respiration rate.
//!
//! ## Algorithms
//! - **Peak detection**: one candidate peak per above-threshold run, minimum
//!   peak spacing, plausible-interval filtering, `60 / median(interval)`
//! - **FFT dominant frequency**: strongest bin of a zero-padded FFT inside the
//!   heart-rate band; respiration uses a Welch PSD instead of a single FFT
//!
//! Every estimator returns `None` when it is inconclusive, when its input
//! holds a non-finite value, or when its result falls outside the mission's
//! physiological range. Nothing here clamps.
//!
//! The heart-rate FFT band starts at a fixed 0.8 Hz rather than at
//! `0.8 × max_frequency`. The narrower sub-band (2.67..3.33 Hz, 160..200
//! BPM) would make resting heart rates unreachable, so the whole 48..200 BPM
//! range is searched.

use crate::mission::{ClassicAlgorithm, Mission};
use crate::spectral::{self, PowerSpectrum};

/// Detection threshold is `mean + PEAK_HEIGHT_FACTOR * (max - mean)`.
/// At zero the threshold sits at the mean and interval filtering does the
/// work of rejecting false peaks.
const PEAK_HEIGHT_FACTOR: f32 = 0.0;

/// Heart-rate FFT search band in Hz (48..200 BPM). The lower edge is a
/// fixed 0.8 Hz, not `0.8 × 200 / 60`.
const HEART_RATE_FFT_BAND: (f64, f64) = (0.8, 200.0 / 60.0);
/// Respiration Welch search band in Hz
const RESPIRATION_FFT_BAND: (f64, f64) = (0.067, 0.5);

/// Plausible spacing between consecutive peaks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalBounds {
    pub min_seconds: f32,
    pub max_seconds: f32,
}

/// 40..200 BPM
pub const HEART_RATE_INTERVALS: IntervalBounds = IntervalBounds {
    min_seconds: 0.3,
    max_seconds: 1.5,
};

/// 8..30 breaths per minute
pub const RESPIRATION_INTERVALS: IntervalBounds = IntervalBounds {
    min_seconds: 2.0,
    max_seconds: 7.5,
};

impl IntervalBounds {
    pub fn for_mission(mission: Mission) -> Option<IntervalBounds> {
        match mission {
            Mission::HeartRate => Some(HEART_RATE_INTERVALS),
            Mission::RespirationRate => Some(RESPIRATION_INTERVALS),
            _ => None,
        }
    }

    /// Per-minute rate range implied by the interval bounds
    pub fn rate_range(&self) -> (f32, f32) {
        (60.0 / self.max_seconds, 60.0 / self.min_seconds)
    }

    fn contains_interval(&self, seconds: f32) -> bool {
        seconds >= self.min_seconds && seconds <= self.max_seconds
    }

    fn contains_rate(&self, rate: f32) -> bool {
        let (low, high) = self.rate_range();
        rate.is_finite() && rate >= low - 1e-3 && rate <= high + 1e-3
    }
}

/// Run `algorithm` for `mission` on an already conditioned signal
pub fn estimate(
    algorithm: ClassicAlgorithm,
    mission: Mission,
    signal: &[f32],
    sample_rate: f32,
    welch_segment_size: usize,
) -> Option<f32> {
    let bounds = IntervalBounds::for_mission(mission)?;
    match (algorithm, mission) {
        (ClassicAlgorithm::PeakDetection, _) => {
            estimate_by_peak_detection(signal, sample_rate, bounds.min_seconds, bounds)
        }
        (ClassicAlgorithm::FftDominantFrequency, Mission::HeartRate) => {
            estimate_heart_rate_by_fft(signal, sample_rate)
        }
        (ClassicAlgorithm::FftDominantFrequency, Mission::RespirationRate) => {
            estimate_respiration_by_fft(signal, sample_rate, welch_segment_size)
        }
        _ => None,
    }
}

/// Indices of candidate peaks: the single maximum of each contiguous run
/// above the adaptive threshold, at least `min_distance` samples apart.
pub fn find_peaks(signal: &[f32], min_distance: usize) -> Vec<usize> {
    if signal.len() < 3 {
        return Vec::new();
    }

    let mean = signal.iter().map(|&x| f64::from(x)).sum::<f64>() as f32 / signal.len() as f32;
    let max = signal.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let min = signal.iter().copied().fold(f32::INFINITY, f32::min);
    if !(max - min).is_finite() || max - min <= f32::EPSILON {
        return Vec::new();
    }
    let threshold = mean + PEAK_HEIGHT_FACTOR * (max - mean);

    let mut peaks: Vec<usize> = Vec::new();
    let mut run_peak: Option<usize> = None;

    let close_run = |run_peak: &mut Option<usize>, peaks: &mut Vec<usize>| {
        if let Some(candidate) = run_peak.take() {
            let far_enough = match peaks.last() {
                Some(&last) => min_distance == 0 || candidate - last >= min_distance,
                None => true,
            };
            if far_enough {
                peaks.push(candidate);
            }
        }
    };

    for (i, &value) in signal.iter().enumerate() {
        if value > threshold {
            run_peak = match run_peak {
                Some(best) if signal[best] >= value => Some(best),
                _ => Some(i),
            };
        } else {
            close_run(&mut run_peak, &mut peaks);
        }
    }
    close_run(&mut run_peak, &mut peaks);

    peaks
}

/// Rate (per minute) from the median spacing of detected peaks.
///
/// Returns `None` with fewer than two peaks, when no interval survives the
/// `bounds` filter, or when the result is outside `bounds.rate_range()`.
pub fn estimate_by_peak_detection(
    signal: &[f32],
    sample_rate: f32,
    min_interval_seconds: f32,
    bounds: IntervalBounds,
) -> Option<f32> {
    if sample_rate <= 0.0 || !all_finite(signal) {
        return None;
    }
    let min_distance = if min_interval_seconds > 0.0 {
        (min_interval_seconds * sample_rate).round() as usize
    } else {
        0
    };

    let peaks = find_peaks(signal, min_distance);
    if peaks.len() < 2 {
        return None;
    }

    let mut intervals: Vec<f32> = peaks
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f32 / sample_rate)
        .filter(|&seconds| bounds.contains_interval(seconds))
        .collect();
    if intervals.is_empty() {
        return None;
    }

    let rate = 60.0 / median(&mut intervals)?;
    if bounds.contains_rate(rate) {
        Some(rate)
    } else {
        None
    }
}

/// Heart rate in BPM from the strongest FFT bin in the heart-rate band
pub fn estimate_heart_rate_by_fft(signal: &[f32], sample_rate: f32) -> Option<f32> {
    if signal.len() < 2 || sample_rate <= 0.0 || !all_finite(signal) {
        return None;
    }
    let centered = remove_mean(signal);
    let fft_len = spectral::next_power_of_two(centered.len());
    let spectrum = spectral::fft_real(&centered, fft_len).ok()?;

    let rate = f64::from(sample_rate);
    let bins = fft_len / 2 + 1;
    let power = PowerSpectrum {
        frequencies: (0..bins).map(|k| k as f64 * rate / fft_len as f64).collect(),
        power: spectrum[..bins].iter().map(|c| c.norm_sqr()).collect(),
    };
    if power.power.iter().all(|&p| p <= f64::EPSILON) {
        return None;
    }

    let (low, high) = HEART_RATE_FFT_BAND;
    let bpm = (power.dominant_frequency(low, high)? * 60.0) as f32;
    if HEART_RATE_INTERVALS.contains_rate(bpm) {
        Some(bpm)
    } else {
        None
    }
}

/// Respiration rate in breaths/min from the dominant Welch PSD frequency
pub fn estimate_respiration_by_fft(
    signal: &[f32],
    sample_rate: f32,
    segment_size: usize,
) -> Option<f32> {
    if signal.len() < 2 || sample_rate <= 0.0 || !all_finite(signal) {
        return None;
    }
    let centered = remove_mean(signal);
    let psd = spectral::welch_psd(&centered, f64::from(sample_rate), segment_size).ok()?;
    if psd.power.iter().all(|&p| p <= f64::EPSILON) {
        return None;
    }

    let (low, high) = RESPIRATION_FFT_BAND;
    let brpm = (psd.dominant_frequency(low, high)? * 60.0) as f32;
    if RESPIRATION_INTERVALS.contains_rate(brpm) {
        Some(brpm)
    } else {
        None
    }
}

fn all_finite(signal: &[f32]) -> bool {
    signal.iter().all(|x| x.is_finite())
}

fn remove_mean(signal: &[f32]) -> Vec<f32> {
    let mean = crate::conditioning::mean(signal);
    signal.iter().map(|&x| x - mean).collect()
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
