//! # Spectral Math Module
//!
//! Stateless numeric building blocks for the frequency-domain estimators:
//! complex arithmetic, a recursive radix-2 Cooley–Tukey FFT, the Hann window
//! and Welch power-spectral-density estimation.
//!
//! ## Key Functions
//! - `fft`: radix-2 transform, input length must be a power of two
//! - `hann_window`: `w(i) = 0.5 * (1 - cos(2πi / (n - 1)))`
//! - `welch_psd`: 50% overlapped, Hann-windowed, averaged periodogram
//!
//! All functions are deterministic and allocate their outputs; nothing here
//! keeps state between calls.

use crate::error::SpectralError;
use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// `e^{iθ}`
    pub fn from_polar_unit(theta: f64) -> Self {
        Self {
            re: theta.cos(),
            im: theta.sin(),
        }
    }

    pub fn norm_sqr(&self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    pub fn magnitude(&self) -> f64 {
        self.norm_sqr().sqrt()
    }
}

impl Add for Complex {
    type Output = Complex;

    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Complex;

    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Complex;

    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

impl From<f64> for Complex {
    fn from(re: f64) -> Self {
        Complex::new(re, 0.0)
    }
}

/// Forward FFT of a power-of-two length sequence.
///
/// `result[k].magnitude()` is the spectral amplitude at bin `k`, with bin
/// frequency `k * sample_rate / len`.
pub fn fft(input: &[Complex]) -> Result<Vec<Complex>, SpectralError> {
    if input.is_empty() {
        return Err(SpectralError::EmptyInput);
    }
    if !input.len().is_power_of_two() {
        return Err(SpectralError::NotPowerOfTwo(input.len()));
    }
    Ok(fft_recursive(input))
}

fn fft_recursive(input: &[Complex]) -> Vec<Complex> {
    let n = input.len();
    if n == 1 {
        return vec![input[0]];
    }

    let even: Vec<Complex> = input.iter().step_by(2).copied().collect();
    let odd: Vec<Complex> = input.iter().skip(1).step_by(2).copied().collect();

    let even = fft_recursive(&even);
    let odd = fft_recursive(&odd);

    let half = n / 2;
    let mut output = vec![Complex::ZERO; n];
    for k in 0..half {
        let twiddle = Complex::from_polar_unit(-2.0 * PI * k as f64 / n as f64) * odd[k];
        output[k] = even[k] + twiddle;
        output[k + half] = even[k] - twiddle;
    }
    output
}

/// Real-valued convenience wrapper: zero-pads `signal` to `len` and transforms.
pub fn fft_real(signal: &[f32], len: usize) -> Result<Vec<Complex>, SpectralError> {
    let mut buffer = vec![Complex::ZERO; len];
    for (slot, &sample) in buffer.iter_mut().zip(signal.iter()) {
        *slot = Complex::from(f64::from(sample));
    }
    fft(&buffer)
}

/// Smallest power of two `>= n` (1 for an empty signal)
pub fn next_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Hann window of length `n`.
///
/// Lengths 0 and 1 have no defined taper; they return all-ones.
pub fn hann_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos()))
        .collect()
}

/// One-sided power spectrum, paired with the bin frequencies
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
}

impl PowerSpectrum {
    /// Frequency of the strongest bin whose frequency lies in `[low_hz, high_hz]`.
    ///
    /// `None` when the band is empty or any power inside it is non-finite.
    pub fn dominant_frequency(&self, low_hz: f64, high_hz: f64) -> Option<f64> {
        let mut best: Option<(f64, f64)> = None;
        for (&freq, &power) in self.frequencies.iter().zip(self.power.iter()) {
            if freq < low_hz || freq > high_hz {
                continue;
            }
            if !power.is_finite() {
                return None;
            }
            best = match best {
                Some((_, best_power)) if best_power >= power => best,
                _ => Some((freq, power)),
            };
        }
        best.map(|(freq, _)| freq)
    }
}

/// Welch power-spectral-density estimate.
///
/// Segments of `segment_size` samples overlap by 50%; each one is Hann
/// windowed, transformed, and its squared magnitude accumulated. The result
/// is the per-segment average. A signal shorter than one segment is treated
/// as a single segment of its own length (windowed to that length and
/// zero-padded to `segment_size`). Output length is `segment_size / 2 + 1`.
pub fn welch_psd(
    signal: &[f32],
    sample_rate: f64,
    segment_size: usize,
) -> Result<PowerSpectrum, SpectralError> {
    if segment_size < 2 || !segment_size.is_power_of_two() {
        return Err(SpectralError::InvalidSegmentSize(segment_size));
    }
    if signal.is_empty() {
        return Err(SpectralError::EmptyInput);
    }

    let bins = segment_size / 2 + 1;
    let mut accumulated = vec![0.0f64; bins];
    let mut segments = 0usize;

    if signal.len() < segment_size {
        accumulate_segment(signal, segment_size, &mut accumulated)?;
        segments = 1;
    } else {
        let step = segment_size / 2;
        let mut start = 0;
        while start + segment_size <= signal.len() {
            accumulate_segment(&signal[start..start + segment_size], segment_size, &mut accumulated)?;
            segments += 1;
            start += step;
        }
    }

    let power = accumulated.into_iter().map(|p| p / segments as f64).collect();
    let frequencies = (0..bins)
        .map(|k| k as f64 * sample_rate / segment_size as f64)
        .collect();

    Ok(PowerSpectrum { frequencies, power })
}

fn accumulate_segment(
    segment: &[f32],
    fft_len: usize,
    accumulated: &mut [f64],
) -> Result<(), SpectralError> {
    let window = hann_window(segment.len());
    let mut buffer = vec![Complex::ZERO; fft_len];
    for ((slot, &sample), &w) in buffer.iter_mut().zip(segment.iter()).zip(window.iter()) {
        *slot = Complex::from(f64::from(sample) * w);
    }
    let spectrum = fft(&buffer)?;
    for (acc, bin) in accumulated.iter_mut().zip(spectrum.iter()) {
        *acc += bin.norm_sqr();
    }
    Ok(())
}
