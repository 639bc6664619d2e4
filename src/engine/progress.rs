//! Simulated progress while an upload is outstanding.
//!
//! The service call is a single opaque request, so the percentage shown to the user
//! is purely cosmetic: it creeps up by random steps and parks below 90 until the
//! controller drives it to completion.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Shortest cadence the reporter runs at; shorter requests are raised to it.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Ceiling while the reporter runs; the last 10% is the completion cue.
pub const RUNNING_CAP: f64 = 90.0;

/// Exclusive upper bound of a single random step.
pub const MAX_INCREMENT: f64 = 15.0;

pub const COMPLETE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressPhase {
    Uploading,
    Processing,
    Upscaling,
}

impl ProgressPhase {
    pub fn for_percent(percent: f64) -> Self {
        if percent < 30.0 {
            ProgressPhase::Uploading
        } else if percent < 60.0 {
            ProgressPhase::Processing
        } else {
            ProgressPhase::Upscaling
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProgressPhase::Uploading => "Uploading image...",
            ProgressPhase::Processing => "Processing image...",
            ProgressPhase::Upscaling => "Applying upscaling algorithm...",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressTick {
    pub percent: f64,
    pub phase: ProgressPhase,
}

/// Accumulated percentage of one run.
#[derive(Debug, Default)]
pub struct ProgressState {
    percent: f64,
}

impl ProgressState {
    /// Apply one step. Negative steps are ignored so the value never decreases.
    pub fn advance(&mut self, increment: f64) -> ProgressTick {
        self.percent = (self.percent + increment.max(0.0)).min(RUNNING_CAP);
        ProgressTick {
            percent: self.percent,
            phase: ProgressPhase::for_percent(self.percent),
        }
    }
}

/// Interval task emitting [`ProgressTick`]s into a sink.
///
/// The sink returns `false` once nobody listens anymore, which ends the task. Dropping
/// the reporter aborts the task as well, so no tick is produced after [`stop`].
///
/// [`stop`]: ProgressReporter::stop
pub struct ProgressReporter {
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn start<F>(interval: Duration, on_tick: F) -> Self
    where
        F: FnMut(ProgressTick) -> bool + Send + 'static,
    {
        Self::start_with_rng(interval, StdRng::from_entropy(), on_tick)
    }

    pub fn start_with_rng<R, F>(interval: Duration, mut rng: R, mut on_tick: F) -> Self
    where
        R: Rng + Send + 'static,
        F: FnMut(ProgressTick) -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut state = ProgressState::default();
            let mut ticker = tokio::time::interval(interval.max(MIN_TICK_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately; skip it so the
            // first step lands one cadence after start.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let tick = state.advance(rng.gen_range(0.0..MAX_INCREMENT));
                if !on_tick(tick) {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
