//! # Raw Sample Types
//!
//! Shapes delivered by the ring transport: one optical + inertial sample per
//! tick at the source rate, and an asynchronously updated signal-quality
//! classification.

use std::fmt;
use std::str::FromStr;

/// One sample as delivered by the transport callback
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawSample {
    pub green: f32,
    pub red: f32,
    pub ir: f32,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    /// Transport timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl RawSample {
    pub fn new(green: f32, red: f32, ir: f32, timestamp_ms: u64) -> Self {
        Self {
            green,
            red,
            ir,
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn with_accel(mut self, x: f32, y: f32, z: f32) -> Self {
        self.accel_x = x;
        self.accel_y = y;
        self.accel_z = z;
        self
    }

    pub fn accel_magnitude(&self) -> f32 {
        (self.accel_x * self.accel_x + self.accel_y * self.accel_y + self.accel_z * self.accel_z).sqrt()
    }

    /// Parse a replay line: `timestamp_ms green red ir ax ay az [quality]`
    pub fn parse_line(line: &str) -> Option<(RawSample, Option<SignalQuality>)> {
        let mut fields = line.split_whitespace();
        let timestamp_ms = fields.next()?.parse().ok()?;
        let mut values = [0.0f32; 6];
        for value in values.iter_mut() {
            *value = fields.next()?.parse().ok()?;
        }
        let quality = match fields.next() {
            Some(token) => Some(token.parse().ok()?),
            None => None,
        };

        let sample = RawSample::new(values[0], values[1], values[2], timestamp_ms)
            .with_accel(values[3], values[4], values[5]);
        Some((sample, quality))
    }
}

/// Optical contact quality, ordered from worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SignalQuality {
    #[default]
    NoSignal,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SignalQuality {
    /// Fair or better samples enter the buffers
    pub fn admits_samples(&self) -> bool {
        *self >= SignalQuality::Fair
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalQuality::NoSignal => "no_signal",
            SignalQuality::Poor => "poor",
            SignalQuality::Fair => "fair",
            SignalQuality::Good => "good",
            SignalQuality::Excellent => "excellent",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SignalQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "no_signal" | "none" | "0" => Ok(SignalQuality::NoSignal),
            "poor" | "1" => Ok(SignalQuality::Poor),
            "fair" | "2" => Ok(SignalQuality::Fair),
            "good" | "3" => Ok(SignalQuality::Good),
            "excellent" | "4" => Ok(SignalQuality::Excellent),
            other => Err(format!("Unknown signal quality: {}", other)),
        }
    }
}
