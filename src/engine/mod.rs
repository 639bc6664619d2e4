mod client;
mod progress;

pub use client::UploadClient;
pub use progress::{
    ProgressPhase, ProgressReporter, ProgressTick, COMPLETE, DEFAULT_TICK_INTERVAL, RUNNING_CAP,
};

use crate::model::{UploadOutcome, UploadRequest};
use async_trait::async_trait;

/// Something that can carry out one upload attempt.
///
/// Implementations never fail: every error is folded into
/// [`UploadOutcome::Failure`] so the controller has a single value to hand off.
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn submit(&self, request: UploadRequest) -> UploadOutcome;
}
