//! Post-run processing for headless runs.
//!
//! Handles the optional download of the upscaled image and the JSON report export
//! once the controller has produced a result.

use crate::engine::UploadClient;
use crate::model::{ScaleFactor, UploadOutcome};
use crate::presenter::{present, DisplayModel};
use anyhow::{Context, Result};
use reqwest::Url;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const FALLBACK_DOWNLOAD_NAME: &str = "upscaled-image";

/// Where post-processing should put things. Built from CLI flags and settings.
#[derive(Debug, Clone, Default)]
pub struct PostProcessOptions {
    /// `--output`: a file path, or a directory (existing, or ending in a separator).
    pub output: Option<PathBuf>,
    /// Directory used when `--output` is not given.
    pub download_dir: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// Facts about the finished run that end up in the report.
#[derive(Debug, Clone)]
pub struct RunContext<'a> {
    pub base_url: &'a str,
    pub file_name: &'a str,
    pub scale_factor: ScaleFactor,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub timestamp_utc: String,
    pub base_url: String,
    pub file_name: String,
    pub scale_factor: ScaleFactor,
    pub view: DisplayModel,
}

impl UploadReport {
    pub fn new(ctx: &RunContext<'_>, outcome: &UploadOutcome) -> Self {
        Self {
            timestamp_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            base_url: ctx.base_url.to_string(),
            file_name: ctx.file_name.to_string(),
            scale_factor: ctx.scale_factor,
            view: present(outcome),
        }
    }
}

/// Result of post-run processing, ready for presentation layers.
#[derive(Debug, Default)]
pub struct ProcessedRun {
    pub messages: Vec<String>,
    /// Set when a requested step did not complete.
    pub failed: bool,
}

pub async fn process_run_completion(
    client: &UploadClient,
    opts: &PostProcessOptions,
    ctx: &RunContext<'_>,
    outcome: &UploadOutcome,
) -> ProcessedRun {
    let mut processed = ProcessedRun::default();

    if let UploadOutcome::Success(success) = outcome {
        if let Some(dest) = download_destination(opts, &success.download_url) {
            match download(client, &success.download_url, &dest).await {
                Ok(bytes) => {
                    info!(path = %dest.display(), bytes, "downloaded upscaled image");
                    processed
                        .messages
                        .push(format!("Saved upscaled image: {}", dest.display()));
                }
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "download failed");
                    processed.messages.push(format!("Download failed: {e:#}"));
                    processed.failed = true;
                }
            }
        }
    }

    if let Some(export_path) = opts.export_json.as_deref() {
        match export_json(export_path, &UploadReport::new(ctx, outcome)).await {
            Ok(()) => processed
                .messages
                .push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => {
                processed.messages.push(format!("Export JSON failed: {e:#}"));
                processed.failed = true;
            }
        }
    }

    processed
}

async fn download(client: &UploadClient, url: &str, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    client.download(url, dest).await
}

/// Resolve the file the upscaled image is written to, if a download was requested.
pub fn download_destination(opts: &PostProcessOptions, download_url: &str) -> Option<PathBuf> {
    match (&opts.output, &opts.download_dir) {
        (Some(output), _) if looks_like_dir(output) => {
            Some(output.join(file_name_from_url(download_url)))
        }
        (Some(output), _) => Some(output.clone()),
        (None, Some(dir)) => Some(dir.join(file_name_from_url(download_url))),
        (None, None) => None,
    }
}

fn looks_like_dir(path: &Path) -> bool {
    path.is_dir()
        || path
            .as_os_str()
            .to_string_lossy()
            .ends_with(std::path::MAIN_SEPARATOR)
}

/// Last non-empty path segment of the URL.
pub fn file_name_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        })
        .unwrap_or_else(|| FALLBACK_DOWNLOAD_NAME.to_string())
}

pub async fn export_json(path: &Path, report: &UploadReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(report).context("serialize report")?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
