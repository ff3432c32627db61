//! Driving an engine frame by frame and recording what it writes

use std::io::Write;

use anyhow::{Context, Result};
use cadence_animation::Engine;
use cadence_core::{MemorySink, RawValue};
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Hard stop for scenes that never go idle (infinite loops) when no `--until` is given
const MAX_RUN_MS: f64 = 60_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("frame rate must be positive, got {0}")]
    FrameRate(f64),
    #[error("sample interval must be positive, got {0}")]
    Interval(f64),
}

#[derive(Clone, Debug)]
pub struct SampleOptions {
    frame_ms: f64,
    until: Option<f64>,
    every: Option<f64>,
}

impl SampleOptions {
    pub fn new(fps: f64, until: Option<f64>, every: Option<f64>) -> Result<Self, SampleError> {
        if fps.is_nan() || fps <= 0.0 {
            return Err(SampleError::FrameRate(fps));
        }
        if let Some(every) = every.filter(|ms| ms.is_nan() || *ms <= 0.0) {
            return Err(SampleError::Interval(every));
        }
        Ok(Self {
            frame_ms: 1000.0 / fps,
            until,
            every,
        })
    }
}

/// One property value at one point in time
#[derive(Clone, Debug, Serialize)]
pub struct Value {
    pub target: u64,
    pub property: String,
    pub value: RawValue,
}

/// Every declared property after one frame
#[derive(Clone, Debug, Serialize)]
pub struct Frame {
    pub time: f64,
    pub values: Vec<Value>,
}

fn snapshot(sink: &MemorySink, time: f64) -> Frame {
    let values = sink
        .targets()
        .into_iter()
        .flat_map(|target| {
            sink.properties(target)
                .into_iter()
                .map(move |(property, value)| Value {
                    target: target.0,
                    property: property.to_string(),
                    value: value.clone(),
                })
        })
        .collect();
    Frame { time, values }
}

/// Drive `engine` until `until`, or until it goes idle
pub fn run(mut engine: Engine<MemorySink>, options: &SampleOptions) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut next_sample = 0.0;
    let mut index = 0u64;
    loop {
        let now = index as f64 * options.frame_ms;
        engine.update(now);

        let due = options.every.map_or(true, |_| now >= next_sample);
        if due {
            frames.push(snapshot(engine.sink(), now));
            if let Some(every) = options.every {
                while next_sample <= now {
                    next_sample += every;
                }
            }
        }

        let done = match options.until {
            Some(until) => now >= until,
            None => engine.is_idle(),
        };
        if done {
            debug!(now, frames = index + 1, "sampling finished");
            break;
        }
        if options.until.is_none() && now >= MAX_RUN_MS {
            warn!(now, "scene still running; stopping (pass --until to sample longer)");
            break;
        }
        index += 1;
    }
    frames
}

/// Print frames in the requested format
pub fn write(out: &mut impl Write, frames: &[Frame], format: Format) -> Result<()> {
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, frames).context("Failed to encode samples")?;
            writeln!(out)?;
        }
        Format::Text => {
            for frame in frames {
                write!(out, "{:>9.1}", frame.time)?;
                for value in &frame.values {
                    write!(out, "  #{}.{}={}", value.target, value.property, value.value)?;
                }
                writeln!(out)?;
            }
        }
    }
    Ok(())
}
