//! # Diagnostics Module
//!
//! One event per notable pipeline step. Every event goes to the `log`
//! facade; when a sink is attached and diagnostics are enabled, it is also
//! forwarded as one text line without blocking the caller.
//!
//! ## Key Types
//! - `DiagnosticEvent`: buffer status, strategy choice, discarded estimate,
//!   reset, rebinding and model failure
//! - `Diagnostics`: the emitter owned by the pipeline

use crate::error::EnsembleError;
use crate::mission::{Mission, StrategyTag};
use crossbeam_channel::{Sender, TrySendError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The estimator produced no value
    Inconclusive,
    /// Non-finite, non-positive or outside the mission range
    OutOfRange,
    /// No strategy could run this cycle
    NoStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    SignalLost,
    Explicit,
    Rebind(Mission),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    BufferStatus {
        mission: Mission,
        fill: usize,
        capacity: usize,
        accel_magnitude: f32,
    },
    StrategyChosen {
        mission: Mission,
        strategy: StrategyTag,
    },
    Discarded {
        mission: Mission,
        raw: Option<f32>,
        reason: DiscardReason,
    },
    Reset {
        reason: ResetReason,
    },
    Rebound {
        mission: Mission,
        strategy: StrategyTag,
    },
    ModelFailure {
        mission: Mission,
        error: EnsembleError,
    },
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::BufferStatus {
                mission,
                fill,
                capacity,
                accel_magnitude,
            } => write!(
                f,
                "[{}] buffer {}/{} samples, motion {:.2}",
                mission, fill, capacity, accel_magnitude
            ),
            DiagnosticEvent::StrategyChosen { mission, strategy } => {
                write!(f, "[{}] strategy {}", mission, strategy)
            }
            DiagnosticEvent::Discarded { mission, raw, reason } => {
                let why = match reason {
                    DiscardReason::Inconclusive => "inconclusive",
                    DiscardReason::OutOfRange => "out of range",
                    DiscardReason::NoStrategy => "no strategy available",
                };
                match raw {
                    Some(value) => write!(f, "[{}] discarded {:.1}: {}", mission, value, why),
                    None => write!(f, "[{}] discarded: {}", mission, why),
                }
            }
            DiagnosticEvent::Reset { reason } => match reason {
                ResetReason::SignalLost => write!(f, "reset: signal lost"),
                ResetReason::Explicit => write!(f, "reset: requested"),
                ResetReason::Rebind(mission) => write!(f, "reset: {} rebound", mission),
            },
            DiagnosticEvent::Rebound { mission, strategy } => {
                write!(f, "[{}] bound to {}", mission, strategy)
            }
            DiagnosticEvent::ModelFailure { mission, error } => {
                write!(f, "[{}] model failure: {}", mission, error)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    enabled: bool,
    sink: Option<Sender<String>>,
}

impl Diagnostics {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, sink: None }
    }

    pub fn attach(&mut self, sink: Sender<String>) {
        self.sink = Some(sink);
    }

    pub fn emit(&mut self, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::Reset { .. } | DiagnosticEvent::Rebound { .. } => log::info!("{}", event),
            DiagnosticEvent::ModelFailure { .. } => log::warn!("{}", event),
            _ => log::debug!("{}", event),
        }

        if !self.enabled {
            return;
        }
        if let Some(sink) = &self.sink {
            if let Err(TrySendError::Disconnected(_)) = sink.try_send(event.to_string()) {
                log::debug!("Diagnostic sink disconnected");
                self.sink = None;
            }
        }
    }
}
