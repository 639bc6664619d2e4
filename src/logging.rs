//! Logging configuration using tracing.
//!
//! Level is controlled by the `UPSCALER_LOG` environment variable, e.g.
//! `UPSCALER_LOG=image_upscaler=debug upscale --text photo.png`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_ENV: &str = "UPSCALER_LOG";
const DEFAULT_FILTER: &str = "image_upscaler=info,warn";
const LOG_FILE: &str = "upscale.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Headless modes: stdout stays reserved for results.
    Stderr,
    /// TUI mode: a daily rolling file so the terminal stays clean.
    File,
}

pub fn init(target: LogTarget) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .compact(),
                )
                .try_init()
                .context("install stderr logger")?;
        }
        LogTarget::File => {
            let log_dir = log_directory();
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("create log directory {}", log_dir.display()))?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(file_appender)
                        .with_ansi(false)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .try_init()
                .context("install file logger")?;

            tracing::info!(dir = %log_dir.display(), "image-upscaler starting");
        }
    }
    Ok(())
}

fn log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("image-upscaler").join("logs")
}
