//! # Inference Worker Module
//!
//! Runs a `Pipeline` on a dedicated thread so the transport callback only
//! ever enqueues. Samples, quality updates and control commands share one
//! unbounded channel and are processed strictly in arrival order, which keeps
//! every buffer and History mutation on a single writer.
//!
//! ## Key Components
//! - `PipelineWorker`: spawns the worker thread
//! - `WorkerHandle`: non-blocking producer side, plus a bounded readings
//!   receiver that drops new readings while it is full
//! - `ResultRouter`: at most one callback per mission, invoked with the final
//!   smoothed value

use crate::error::{BindingError, WorkerError};
use crate::mission::{EstimationStrategy, Mission};
use crate::orchestrator::{MissionStatus, Pipeline, VitalReading};
use crate::sample::{RawSample, SignalQuality};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::thread;

/// Command sent from the producer side to the worker thread
enum PipelineCommand {
    Sample(RawSample),
    Quality(SignalQuality),
    Reset,
    Rebind {
        mission: Mission,
        strategy: EstimationStrategy,
        reply: Sender<Result<(), BindingError>>,
    },
    Status(Sender<Vec<MissionStatus>>),
    Shutdown,
}

/// Readings kept for `WorkerHandle::readings` before new ones are dropped
pub const READINGS_CAPACITY: usize = 64;

pub type ResultCallback = Box<dyn FnMut(i32) + Send>;

/// Per-mission result callbacks
#[derive(Default)]
pub struct ResultRouter {
    callbacks: HashMap<Mission, ResultCallback>,
}

impl ResultRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback for `mission`, replacing any previous one
    pub fn on(mut self, mission: Mission, callback: impl FnMut(i32) + Send + 'static) -> Self {
        self.callbacks.insert(mission, Box::new(callback));
        self
    }

    fn dispatch(&mut self, reading: &VitalReading) {
        if let Some(callback) = self.callbacks.get_mut(&reading.mission) {
            callback(reading.value);
        }
    }
}

pub struct PipelineWorker;

impl PipelineWorker {
    /// Move `pipeline` onto its own thread
    pub fn spawn(pipeline: Pipeline, router: ResultRouter) -> Result<WorkerHandle, WorkerError> {
        let (command_tx, command_rx) = unbounded();
        let (reading_tx, reading_rx) = bounded(READINGS_CAPACITY);

        let thread = thread::Builder::new()
            .name("vitals-inference".to_string())
            .spawn(move || Self::worker_loop(pipeline, router, command_rx, reading_tx))
            .map_err(WorkerError::Spawn)?;

        log::info!("Inference worker started");

        Ok(WorkerHandle {
            command_tx,
            readings: reading_rx,
            thread: Some(thread),
        })
    }

    fn worker_loop(
        mut pipeline: Pipeline,
        mut router: ResultRouter,
        command_rx: Receiver<PipelineCommand>,
        reading_tx: Sender<VitalReading>,
    ) {
        loop {
            match command_rx.recv() {
                Ok(PipelineCommand::Sample(sample)) => {
                    let quality = pipeline.quality();
                    for reading in pipeline.admit(&sample, quality) {
                        router.dispatch(&reading);
                        if let Err(TrySendError::Full(reading)) = reading_tx.try_send(reading) {
                            log::debug!("Readings queue full, dropped {}", reading);
                        }
                    }
                }
                Ok(PipelineCommand::Quality(quality)) => {
                    log::debug!("Signal quality: {}", quality);
                    pipeline.set_quality(quality);
                }
                Ok(PipelineCommand::Reset) => pipeline.reset(),
                Ok(PipelineCommand::Rebind {
                    mission,
                    strategy,
                    reply,
                }) => {
                    let result = pipeline.rebind(mission, strategy);
                    if let Err(e) = &result {
                        log::error!("Rejected binding for {}: {}", mission, e);
                    }
                    let _ = reply.send(result);
                }
                Ok(PipelineCommand::Status(reply)) => {
                    let _ = reply.send(pipeline.status());
                }
                Ok(PipelineCommand::Shutdown) => {
                    log::info!("Inference worker stopped");
                    break;
                }
                Err(_) => {
                    log::info!("Inference worker: command channel closed");
                    break;
                }
            }
        }
    }
}

/// Producer-side handle. Dropping it stops and joins the worker.
pub struct WorkerHandle {
    command_tx: Sender<PipelineCommand>,
    readings: Receiver<VitalReading>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Enqueue one sample; never waits for an inference
    pub fn push_sample(&self, sample: RawSample) -> Result<(), WorkerError> {
        self.send(PipelineCommand::Sample(sample))
    }

    pub fn set_quality(&self, quality: SignalQuality) -> Result<(), WorkerError> {
        self.send(PipelineCommand::Quality(quality))
    }

    pub fn reset(&self) -> Result<(), WorkerError> {
        self.send(PipelineCommand::Reset)
    }

    /// Swap a mission's strategy, waiting for the worker to accept or reject it
    pub fn rebind(&self, mission: Mission, strategy: EstimationStrategy) -> Result<(), WorkerError> {
        let (reply, response) = bounded(1);
        self.send(PipelineCommand::Rebind {
            mission,
            strategy,
            reply,
        })?;
        response
            .recv()
            .map_err(|_| WorkerError::Disconnected)?
            .map_err(WorkerError::Rejected)
    }

    /// Snapshot taken after every previously queued command was processed
    pub fn status(&self) -> Result<Vec<MissionStatus>, WorkerError> {
        let (reply, response) = bounded(1);
        self.send(PipelineCommand::Status(reply))?;
        response.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Readings not yet taken, at most `READINGS_CAPACITY`; callbacks see every one
    pub fn readings(&self) -> &Receiver<VitalReading> {
        &self.readings
    }

    /// Stop the worker after it drains the commands already queued
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn send(&self, command: PipelineCommand) -> Result<(), WorkerError> {
        self.command_tx
            .send(command)
            .map_err(|_| WorkerError::Disconnected)
    }

    fn stop(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = self.command_tx.send(PipelineCommand::Shutdown);
            if handle.join().is_err() {
                log::error!("Inference worker panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
