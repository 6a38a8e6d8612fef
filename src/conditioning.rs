//! # Signal Conditioning Module
//!
//! Band-pass approximations built from two cascaded moving averages:
//! a short moving-average low-pass followed by subtraction of a longer
//! "trend". Exact cutoff frequencies are not guaranteed, only the
//! qualitative passband.
//!
//! | Band          | Low-pass window | Trend removed            |
//! |---------------|-----------------|--------------------------|
//! | Physiological | 0.5 s           | 2 s moving average       |
//! | Respiratory   | 3 s             | whole-signal mean        |
//!
//! Input shorter than the conditioner's window is returned unmodified.

use crate::mission::Band;

const PHYSIOLOGICAL_SMOOTH_SECONDS: f32 = 0.5;
const PHYSIOLOGICAL_TREND_SECONDS: f32 = 2.0;
const RESPIRATORY_SMOOTH_SECONDS: f32 = 3.0;

/// Condition `signal` (sampled at `sample_rate` Hz) for the given band
pub fn condition(signal: &[f32], sample_rate: f32, band: Band) -> Vec<f32> {
    match band {
        Band::Physiological => physiological_bandpass(signal, sample_rate),
        Band::Respiratory => respiratory_bandpass(signal, sample_rate),
    }
}

/// Approximate HR/BP/SpO2 passband: 0.5 s smoothing minus a 2 s trend
pub fn physiological_bandpass(signal: &[f32], sample_rate: f32) -> Vec<f32> {
    let smooth_len = window_samples(PHYSIOLOGICAL_SMOOTH_SECONDS, sample_rate);
    let trend_len = window_samples(PHYSIOLOGICAL_TREND_SECONDS, sample_rate);
    if signal.len() < trend_len {
        return signal.to_vec();
    }

    let smoothed = moving_average(signal, smooth_len);
    let trend = moving_average(&smoothed, trend_len);
    smoothed
        .iter()
        .zip(trend.iter())
        .map(|(s, t)| s - t)
        .collect()
}

/// Approximate respiration passband: 3 s smoothing minus the mean
pub fn respiratory_bandpass(signal: &[f32], sample_rate: f32) -> Vec<f32> {
    let smooth_len = window_samples(RESPIRATORY_SMOOTH_SECONDS, sample_rate);
    if signal.len() < smooth_len {
        return signal.to_vec();
    }

    let smoothed = moving_average(signal, smooth_len);
    let mean = mean(&smoothed);
    smoothed.into_iter().map(|s| s - mean).collect()
}

/// Centered moving average over `2 * (window / 2) + 1` samples; the window
/// shrinks at the edges instead of padding.
pub fn moving_average(signal: &[f32], window: usize) -> Vec<f32> {
    let n = signal.len();
    if window <= 1 || n == 0 {
        return signal.to_vec();
    }

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    for &sample in signal {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + f64::from(sample));
    }

    let half = window / 2;
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            ((prefix[hi] - prefix[lo]) / (hi - lo) as f64) as f32
        })
        .collect()
}

/// Z-score normalization; a constant (or empty) signal maps to zeros
pub fn normalize(signal: &[f32]) -> Vec<f32> {
    if signal.is_empty() {
        return Vec::new();
    }
    let mean = mean(signal);
    let variance = signal
        .iter()
        .map(|&x| {
            let d = f64::from(x - mean);
            d * d
        })
        .sum::<f64>()
        / signal.len() as f64;
    let std_dev = variance.sqrt() as f32;

    if !std_dev.is_finite() || std_dev < f32::EPSILON {
        return vec![0.0; signal.len()];
    }
    signal.iter().map(|&x| (x - mean) / std_dev).collect()
}

pub fn mean(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&x| f64::from(x)).sum::<f64>() / signal.len() as f64) as f32
}

fn window_samples(seconds: f32, sample_rate: f32) -> usize {
    ((seconds * sample_rate).round() as usize).max(1)
}
