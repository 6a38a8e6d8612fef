//! # Error Types Module
//!
//! Centralized error handling for the vitals pipeline.
//! Every failure the core can produce is locally recoverable: none of these
//! types is meant to end the process.
//!
//! ## Error Types
//! - `ConfigError`: Configuration file I/O, parsing and validation errors
//! - `BindingError`: Strategy bindings rejected before any buffering begins
//! - `SpectralError`: Numeric preconditions of the FFT / Welch routines
//! - `ModelError`: Failure of a single fold-model
//! - `EnsembleError`: Failure of a whole ensemble call
//! - `WorkerError`: The inference worker thread is unreachable or refused a command
//!
//! ## Usage Examples
//! ```rust,ignore
//! // Config module uses ConfigError
//! pub fn load() -> Result<Config, ConfigError> { ... }
//!
//! // Orchestrator rejects incompatible strategies up front
//! pub fn rebind(&mut self, mission: Mission, strategy: EstimationStrategy) -> Result<(), BindingError> { ... }
//!
//! // Ensemble degrades per fold and only fails when every fold failed
//! pub fn predict(&self, tensor: &Tensor) -> Result<f32, EnsembleError> { ... }
//! ```

use crate::mission::{ClassicAlgorithm, Mission};
use std::fmt;

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
    /// A setting is out of its valid domain
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
            ConfigError::Invalid(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Errors raised when binding an estimation strategy to a mission
#[derive(Debug, Clone, PartialEq)]
pub enum BindingError {
    /// The classic algorithm has no variant for this mission
    IncompatibleClassic {
        mission: Mission,
        algorithm: ClassicAlgorithm,
    },
    /// A learned strategy was bound with no fold-models
    EmptyEnsemble { mission: Mission },
    /// The ensemble expects a tensor shape the mission cannot produce
    ShapeMismatch {
        mission: Mission,
        pipeline: (usize, usize, usize),
        ensemble: (usize, usize, usize),
    },
    /// Window or rate settings cannot produce a usable buffer
    InvalidSettings(String),
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingError::IncompatibleClassic { mission, algorithm } => {
                write!(f, "Classic algorithm {} cannot estimate {}", algorithm, mission)
            }
            BindingError::EmptyEnsemble { mission } => {
                write!(f, "Learned strategy for {} has no fold-models", mission)
            }
            BindingError::ShapeMismatch {
                mission,
                pipeline,
                ensemble,
            } => {
                write!(
                    f,
                    "Ensemble for {} expects tensor shape {:?}, pipeline produces {:?}",
                    mission, ensemble, pipeline
                )
            }
            BindingError::InvalidSettings(msg) => {
                write!(f, "Invalid pipeline settings: {}", msg)
            }
        }
    }
}

impl std::error::Error for BindingError {}

/// Numeric precondition violations in the spectral routines
#[derive(Debug, Clone, PartialEq)]
pub enum SpectralError {
    /// Radix-2 FFT needs a power-of-two length
    NotPowerOfTwo(usize),
    /// Nothing to transform
    EmptyInput,
    /// Welch segment size must be a power of two of at least 2
    InvalidSegmentSize(usize),
}

impl fmt::Display for SpectralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpectralError::NotPowerOfTwo(len) => {
                write!(f, "FFT input length {} is not a power of two", len)
            }
            SpectralError::EmptyInput => write!(f, "Spectral input is empty"),
            SpectralError::InvalidSegmentSize(size) => {
                write!(f, "Welch segment size {} is not a power of two >= 2", size)
            }
        }
    }
}

impl std::error::Error for SpectralError {}

/// Failure of one fold-model invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The model raised an error while running
    Failed(String),
    /// The model returned something that is not a usable scalar
    Malformed(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Failed(msg) => write!(f, "Model invocation failed: {}", msg),
            ModelError::Malformed(msg) => write!(f, "Malformed model output: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

/// Failure of an ensemble call as a whole
#[derive(Debug, Clone, PartialEq)]
pub enum EnsembleError {
    /// Input tensor does not have the shape the folds were trained on
    ShapeMismatch {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
    /// Every fold failed; carries how many were tried
    AllFoldsFailed { folds: usize },
}

impl fmt::Display for EnsembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsembleError::ShapeMismatch { expected, actual } => {
                write!(f, "Tensor shape {:?} does not match expected {:?}", actual, expected)
            }
            EnsembleError::AllFoldsFailed { folds } => {
                write!(f, "All {} fold-models failed", folds)
            }
        }
    }
}

impl std::error::Error for EnsembleError {}

/// Errors talking to the inference worker thread
#[derive(Debug)]
pub enum WorkerError {
    /// Failed to spawn the worker thread
    Spawn(std::io::Error),
    /// The worker has shut down and no longer accepts commands
    Disconnected,
    /// The worker refused a new strategy binding
    Rejected(BindingError),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Spawn(e) => write!(f, "Failed to spawn inference worker: {}", e),
            WorkerError::Disconnected => write!(f, "Inference worker is no longer running"),
            WorkerError::Rejected(e) => write!(f, "Binding rejected by inference worker: {}", e),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Spawn(e) => Some(e),
            WorkerError::Rejected(e) => Some(e),
            WorkerError::Disconnected => None,
        }
    }
}
