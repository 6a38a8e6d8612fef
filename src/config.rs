//! # Configuration Management Module
//!
//! Pipeline settings stored as TOML in the platform config directory.
//! Handles loading, saving, validation and defaults.
//!
//! ## Settings
//! - `source_sample_rate_hz`: Rate the ring delivers samples at
//! - `physiological` / `respiratory`: Buffer windows and resampling targets
//! - `policy`: Learned-model fallback heuristics
//! - `missions`: Cadence, valid range and default classic algorithm per mission
//! - `diagnostics`: Emit the debug event stream
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/ring-vitals/config.toml
//! - Linux: ~/.config/ring-vitals/config.toml
//! - Windows: %APPDATA%\ring-vitals\config.toml

use crate::error::ConfigError;
use crate::mission::{Band, ClassicAlgorithm, Mission, MissionProfile};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_sample_rate_hz: f32,
    pub diagnostics: bool,
    #[serde(deserialize_with = "physiological_window")]
    pub physiological: WindowSettings,
    #[serde(deserialize_with = "respiratory_window")]
    pub respiratory: WindowSettings,
    pub policy: PolicySettings,
    pub missions: MissionTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_sample_rate_hz: 25.0,
            diagnostics: true,
            physiological: WindowSettings::physiological(),
            respiratory: WindowSettings::respiratory(),
            policy: PolicySettings::default(),
            missions: MissionTable::default(),
        }
    }
}

/// Buffer window and resampling target for one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowSettings {
    /// Buffer capacity and full inference window
    pub window_seconds: f32,
    /// Data needed before the first inference
    pub min_seconds: f32,
    /// Rate the window is resampled to before estimation
    pub target_rate_hz: f32,
    /// Maximum Welch segment for the respiration spectrum
    pub welch_segment_size: usize,
}

/// A band table as written in the file; missing keys keep the band's default
#[derive(Debug, Deserialize)]
struct WindowOverrides {
    window_seconds: Option<f32>,
    min_seconds: Option<f32>,
    target_rate_hz: Option<f32>,
    welch_segment_size: Option<usize>,
}

impl WindowOverrides {
    fn apply(self, defaults: WindowSettings) -> WindowSettings {
        WindowSettings {
            window_seconds: self.window_seconds.unwrap_or(defaults.window_seconds),
            min_seconds: self.min_seconds.unwrap_or(defaults.min_seconds),
            target_rate_hz: self.target_rate_hz.unwrap_or(defaults.target_rate_hz),
            welch_segment_size: self.welch_segment_size.unwrap_or(defaults.welch_segment_size),
        }
    }
}

fn physiological_window<'de, D: Deserializer<'de>>(deserializer: D) -> Result<WindowSettings, D::Error> {
    Ok(WindowOverrides::deserialize(deserializer)?.apply(WindowSettings::physiological()))
}

fn respiratory_window<'de, D: Deserializer<'de>>(deserializer: D) -> Result<WindowSettings, D::Error> {
    Ok(WindowOverrides::deserialize(deserializer)?.apply(WindowSettings::respiratory()))
}

impl WindowSettings {
    /// 8 s window, 4 s minimum, kept at 25 Hz
    pub fn physiological() -> Self {
        Self {
            window_seconds: 8.0,
            min_seconds: 4.0,
            target_rate_hz: 25.0,
            welch_segment_size: 256,
        }
    }

    /// 30 s window, 15 s minimum, resampled to 10 Hz
    pub fn respiratory() -> Self {
        Self {
            window_seconds: 30.0,
            min_seconds: 15.0,
            target_rate_hz: 10.0,
            welch_segment_size: 256,
        }
    }

    /// Buffer capacity in source samples
    pub fn capacity(&self, source_rate: f32) -> usize {
        (self.window_seconds * source_rate).round() as usize
    }

    pub fn min_samples(&self, source_rate: f32) -> usize {
        (self.min_seconds * source_rate).round() as usize
    }

    /// Resampled window length handed to estimators and models
    pub fn target_length(&self) -> usize {
        (self.window_seconds * self.target_rate_hz).round() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Use peak detection while a learned mission only has the minimum window
    pub partial_window_fallback: bool,
    /// Learned HR below this value is cross-checked with peak detection
    pub low_heart_rate_threshold: Option<f32>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            partial_window_fallback: true,
            low_heart_rate_threshold: Some(50.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MissionConfig {
    pub cadence_seconds: f32,
    pub min_value: f32,
    pub max_value: f32,
    /// Classic algorithm bound at startup; `None` leaves the mission for a learned binding
    pub classic: Option<ClassicAlgorithm>,
}

/// A mission table as written in the file. Missing numbers keep the
/// mission's default; a missing `classic` means no classic binding.
#[derive(Debug, Deserialize)]
struct MissionOverrides {
    cadence_seconds: Option<f32>,
    min_value: Option<f32>,
    max_value: Option<f32>,
    classic: Option<ClassicAlgorithm>,
}

impl MissionOverrides {
    fn apply(self, defaults: MissionConfig) -> MissionConfig {
        MissionConfig {
            cadence_seconds: self.cadence_seconds.unwrap_or(defaults.cadence_seconds),
            min_value: self.min_value.unwrap_or(defaults.min_value),
            max_value: self.max_value.unwrap_or(defaults.max_value),
            classic: self.classic,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MissionTableOverrides {
    heart_rate: Option<MissionOverrides>,
    systolic_bp: Option<MissionOverrides>,
    diastolic_bp: Option<MissionOverrides>,
    spo2: Option<MissionOverrides>,
    respiration_rate: Option<MissionOverrides>,
}

impl From<MissionTableOverrides> for MissionTable {
    fn from(overrides: MissionTableOverrides) -> Self {
        let defaults = MissionTable::default();
        let merge = |entry: Option<MissionOverrides>, default: MissionConfig| match entry {
            Some(entry) => entry.apply(default),
            None => default,
        };
        MissionTable {
            heart_rate: merge(overrides.heart_rate, defaults.heart_rate),
            systolic_bp: merge(overrides.systolic_bp, defaults.systolic_bp),
            diastolic_bp: merge(overrides.diastolic_bp, defaults.diastolic_bp),
            spo2: merge(overrides.spo2, defaults.spo2),
            respiration_rate: merge(overrides.respiration_rate, defaults.respiration_rate),
        }
    }
}

impl MissionConfig {
    pub fn profile(&self) -> MissionProfile {
        MissionProfile {
            cadence_ms: (self.cadence_seconds * 1000.0).round() as u64,
            min_value: self.min_value,
            max_value: self.max_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MissionTableOverrides")]
pub struct MissionTable {
    pub heart_rate: MissionConfig,
    pub systolic_bp: MissionConfig,
    pub diastolic_bp: MissionConfig,
    pub spo2: MissionConfig,
    pub respiration_rate: MissionConfig,
}

impl Default for MissionTable {
    fn default() -> Self {
        Self {
            heart_rate: MissionConfig {
                cadence_seconds: 2.0,
                min_value: 40.0,
                max_value: 200.0,
                classic: Some(ClassicAlgorithm::PeakDetection),
            },
            systolic_bp: MissionConfig {
                cadence_seconds: 2.0,
                min_value: 70.0,
                max_value: 200.0,
                classic: None,
            },
            diastolic_bp: MissionConfig {
                cadence_seconds: 2.0,
                min_value: 40.0,
                max_value: 130.0,
                classic: None,
            },
            spo2: MissionConfig {
                cadence_seconds: 2.0,
                min_value: 70.0,
                max_value: 100.0,
                classic: None,
            },
            respiration_rate: MissionConfig {
                cadence_seconds: 5.0,
                min_value: 8.0,
                max_value: 30.0,
                classic: Some(ClassicAlgorithm::FftDominantFrequency),
            },
        }
    }
}

impl MissionTable {
    pub fn get(&self, mission: Mission) -> &MissionConfig {
        match mission {
            Mission::HeartRate => &self.heart_rate,
            Mission::SystolicBp => &self.systolic_bp,
            Mission::DiastolicBp => &self.diastolic_bp,
            Mission::SpO2 => &self.spo2,
            Mission::RespirationRate => &self.respiration_rate,
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ring-vitals")
            .join("config.toml")
    }

    /// Load config from the platform location, creating the default if missing
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save()?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Load config from an explicit file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFailed)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(ConfigError::ParseFailed)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the platform location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::config_path())
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    pub fn window(&self, band: Band) -> &WindowSettings {
        match band {
            Band::Physiological => &self.physiological,
            Band::Respiratory => &self.respiratory,
        }
    }

    /// Tensor shape `(1, windowLength, channelCount)` for a mission
    pub fn tensor_shape(&self, mission: Mission) -> (usize, usize, usize) {
        (
            1,
            self.window(mission.band()).target_length(),
            mission.channels().len(),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.source_sample_rate_hz.is_finite() && self.source_sample_rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "source_sample_rate_hz must be positive, got {}",
                self.source_sample_rate_hz
            )));
        }

        for (name, window) in [("physiological", &self.physiological), ("respiratory", &self.respiratory)] {
            if !(window.window_seconds > 0.0 && window.target_rate_hz > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{}: window_seconds and target_rate_hz must be positive",
                    name
                )));
            }
            if !(window.min_seconds > 0.0 && window.min_seconds <= window.window_seconds) {
                return Err(ConfigError::Invalid(format!(
                    "{}: min_seconds must be in (0, window_seconds]",
                    name
                )));
            }
            if window.welch_segment_size < 2 || !window.welch_segment_size.is_power_of_two() {
                return Err(ConfigError::Invalid(format!(
                    "{}: welch_segment_size {} is not a power of two",
                    name, window.welch_segment_size
                )));
            }
            if window.min_samples(self.source_sample_rate_hz) < 2 {
                return Err(ConfigError::Invalid(format!(
                    "{}: minimum window holds fewer than 2 samples",
                    name
                )));
            }
        }

        for mission in Mission::ALL {
            let settings = self.missions.get(mission);
            if !(settings.cadence_seconds >= 0.0 && settings.min_value > 0.0 && settings.min_value < settings.max_value) {
                return Err(ConfigError::Invalid(format!(
                    "{}: cadence must be >= 0 and 0 < min_value < max_value",
                    mission
                )));
            }
            if settings.min_value.ceil() > settings.max_value.floor() {
                return Err(ConfigError::Invalid(format!(
                    "{}: no whole value lies between {} and {}",
                    mission, settings.min_value, settings.max_value
                )));
            }
            if let Some(algorithm) = settings.classic {
                if !algorithm.supports(mission) {
                    return Err(ConfigError::Invalid(format!(
                        "{}: classic algorithm {} is not available",
                        mission, algorithm
                    )));
                }
            }
        }

        Ok(())
    }
}
