//! Replay a recorded sample stream through the vitals pipeline.
//!
//! Usage: `ring-vitals [FILE]` (reads stdin without a file). Each line is
//! `timestamp_ms green red ir accel_x accel_y accel_z [quality]`; blank lines
//! and lines starting with `#` are skipped.

use ring_vitals::{Config, Pipeline, PipelineWorker, RawSample, ResultRouter, SignalQuality, WorkerHandle};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load().unwrap_or_else(|e| {
        log::error!("Failed to load config: {}. Using defaults.", e);
        Config::default()
    });

    let mut pipeline = Pipeline::new(&config)?;
    let (diagnostic_tx, diagnostic_rx) = crossbeam_channel::unbounded::<String>();
    if config.diagnostics {
        pipeline.attach_diagnostics(diagnostic_tx);
    }

    let worker = PipelineWorker::spawn(pipeline, ResultRouter::new())?;

    let input: Box<dyn BufRead> = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Replaying {}", path);
            Box::new(BufReader::new(File::open(&path)?))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    // Lines without a quality column are treated as good contact
    let mut quality = None;
    let mut skipped = 0usize;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((sample, line_quality)) = RawSample::parse_line(trimmed) else {
            skipped += 1;
            continue;
        };

        let next_quality = line_quality.unwrap_or(SignalQuality::Good);
        if quality != Some(next_quality) {
            worker.set_quality(next_quality)?;
            quality = Some(next_quality);
        }
        worker.push_sample(sample)?;

        print_pending(&worker, &diagnostic_rx);
    }

    // Wait for the worker to drain the queue before the final flush
    let status = worker.status()?;
    print_pending(&worker, &diagnostic_rx);

    for mission in status {
        log::info!(
            "{}: {} ({} / {} samples, {} in history)",
            mission.mission,
            mission.phase,
            mission.buffered,
            mission.capacity,
            mission.history_len
        );
    }
    if skipped > 0 {
        log::warn!("Skipped {} malformed lines", skipped);
    }

    worker.shutdown();
    Ok(())
}

fn print_pending(worker: &WorkerHandle, diagnostics: &crossbeam_channel::Receiver<String>) {
    for line in diagnostics.try_iter() {
        eprintln!("# {}", line);
    }
    for reading in worker.readings().try_iter() {
        let now = chrono::Local::now().format("%H:%M:%S%.3f");
        println!("{} t={}ms {}", now, reading.timestamp_ms, reading);
    }
}
