//! Maps upload outcomes into display models.
//!
//! Pure formatting only: no I/O, and every outcome yields something renderable.

use crate::model::{Dimensions, UploadOutcome, UploadSuccess};
use serde::Serialize;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub dimensions: String,
    pub file_size: String,
}

impl ImageSummary {
    fn new(dimensions: Dimensions, size_bytes: u64) -> Self {
        Self {
            dimensions: dimensions.to_string(),
            file_size: format_file_size(size_bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessView {
    pub original_image: String,
    pub upscaled_image: String,
    pub original: ImageSummary,
    pub upscaled: ImageSummary,
    pub scale_label: String,
    pub download_url: String,
}

impl SuccessView {
    /// Lines used by the text front-end.
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!(
                "Original: {} ({})",
                self.original.dimensions, self.original.file_size
            ),
            format!(
                "Upscaled: {} ({}), scale factor {}",
                self.upscaled.dimensions, self.upscaled.file_size, self.scale_label
            ),
            format!("Original image: {}", self.original_image),
            format!("Upscaled image: {}", self.upscaled_image),
            format!("Download: {}", self.download_url),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DisplayModel {
    Success(SuccessView),
    Error { message: String },
}

pub fn present(outcome: &UploadOutcome) -> DisplayModel {
    match outcome {
        UploadOutcome::Success(success) => DisplayModel::Success(present_success(success)),
        UploadOutcome::Failure { message } => DisplayModel::Error {
            message: message.clone(),
        },
    }
}

fn present_success(success: &UploadSuccess) -> SuccessView {
    SuccessView {
        original_image: success.original_url.clone(),
        upscaled_image: success.upscaled_url.clone(),
        original: ImageSummary::new(success.original_dimensions, success.original_size_bytes),
        upscaled: ImageSummary::new(success.upscaled_dimensions, success.upscaled_size_bytes),
        scale_label: format!("{}x", trim_decimals(success.scale_factor)),
        download_url: success.download_url.clone(),
    }
}

/// Human-readable size in base-1024 steps, two decimals, trailing zeros trimmed.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", trim_decimals(value), SIZE_UNITS[unit])
}

fn trim_decimals(value: f64) -> String {
    let fixed = format!("{value:.2}");
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        fixed
    }
}
