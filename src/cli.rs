use crate::config::{self, Settings};
use crate::display::TextDisplay;
use crate::engine::{UploadClient, UploadService, DEFAULT_TICK_INTERVAL};
use crate::error::GENERIC_SERVICE_ERROR;
use crate::model::{ClientConfig, LifecycleState, RawFileDescriptor, ScaleFactor, UploadOutcome};
use crate::orchestrator::{
    self, ControllerHandle, ControllerSettings, PostProcessOptions, RunContext, UiCommand,
};
use crate::presenter::{present, DisplayModel};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Output line routing for stdout/stderr writer.
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "upscale",
    version,
    about = "Upload an image to an upscaling service and fetch the result"
)]
pub struct Cli {
    /// Image to upscale (PNG, JPG, JPEG or WebP, at most 16MB)
    pub file: Option<PathBuf>,

    /// Base URL of the upscaling service
    #[arg(long, env = "UPSCALER_BASE_URL")]
    pub base_url: Option<String>,

    /// Upscaling factor
    #[arg(long, value_enum)]
    pub scale: Option<ScaleFactor>,

    /// Print the result as JSON and exit (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Print a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Save the upscaled image to this file or directory
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write a JSON report of the run
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Request timeout for the upload
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,

    /// Cadence of the progress indicator
    #[arg(long, value_parser = parse_tick_interval)]
    pub progress_interval: Option<humantime::Duration>,

    /// Pause at 100% before the result is shown
    #[arg(long)]
    pub teardown_delay: Option<humantime::Duration>,

    /// Settings file (defaults to <config dir>/image-upscaler/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Text and JSON modes run without a terminal UI.
    pub fn is_headless(&self) -> bool {
        self.json || self.text || cfg!(not(feature = "tui"))
    }
}

/// How a headless run ended, for the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
}

pub async fn run(args: Cli) -> Result<RunStatus> {
    let settings = config::load_settings(args.config.as_deref());
    let cfg = build_config(&args, &settings);
    info!(base_url = %cfg.base_url, scale = %cfg.scale_factor, "configuration loaded");

    if !args.is_headless() {
        #[cfg(feature = "tui")]
        {
            crate::tui::run(args, cfg).await?;
            return Ok(RunStatus::Completed);
        }
    }

    run_headless(args, cfg).await
}

/// Merge CLI flags over settings over built-in defaults.
pub fn build_config(args: &Cli, settings: &Settings) -> ClientConfig {
    ClientConfig {
        base_url: args
            .base_url
            .clone()
            .or_else(|| settings.base_url.clone())
            .unwrap_or_else(|| config::DEFAULT_BASE_URL.to_string()),
        scale_factor: args
            .scale
            .or(settings.scale_factor)
            .unwrap_or_default(),
        request_timeout: pick_duration(
            args.timeout,
            settings.request_timeout,
            config::DEFAULT_REQUEST_TIMEOUT,
        ),
        progress_interval: pick_duration(
            args.progress_interval,
            settings.progress_interval.filter(|d| {
                if d.is_zero() {
                    warn!("progress_interval in settings must be non-zero, using default");
                }
                !d.is_zero()
            }),
            DEFAULT_TICK_INTERVAL,
        ),
        teardown_delay: pick_duration(
            args.teardown_delay,
            settings.teardown_delay,
            config::DEFAULT_TEARDOWN_DELAY,
        ),
        user_agent: format!("image-upscaler/{}", env!("CARGO_PKG_VERSION")),
        download_dir: settings.download_dir.clone(),
    }
}

fn parse_tick_interval(s: &str) -> Result<humantime::Duration, String> {
    let d: humantime::Duration = s.parse().map_err(|e| format!("{e}"))?;
    if Duration::from(d).is_zero() {
        return Err("must be greater than zero".into());
    }
    Ok(d)
}

fn pick_duration(
    flag: Option<humantime::Duration>,
    setting: Option<Duration>,
    default: Duration,
) -> Duration {
    flag.map(Duration::from).or(setting).unwrap_or(default)
}

/// One-shot upload driven through the controller, printing to stdout/stderr.
async fn run_headless(args: Cli, cfg: ClientConfig) -> Result<RunStatus> {
    let path = args
        .file
        .clone()
        .context("an image file is required in --json/--text mode")?;
    let raw = RawFileDescriptor::from_path(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = raw.name.clone();

    let client = Arc::new(UploadClient::new(&cfg)?);
    let (out_tx, out_handle) = spawn_output_writer();
    let display = TextDisplay::new(out_tx.clone(), !args.json);
    let service: Arc<dyn UploadService> = client.clone();
    let (handle, task) =
        orchestrator::spawn_controller(service, display, ControllerSettings::from(&cfg));

    let outcome = tokio::select! {
        outcome = drive_upload(&handle, raw, cfg.scale_factor) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            handle.shutdown();
            anyhow::bail!("interrupted");
        }
    };

    let model = present(&outcome);
    match &model {
        DisplayModel::Success(view) if !args.json => {
            for line in view.summary_lines() {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
        }
        // Failures were already reported on stderr by the display.
        DisplayModel::Error { .. } if !args.json => {}
        _ => {
            let json = serde_json::to_string_pretty(&model)?;
            let _ = out_tx.send(OutputLine::Stdout(json));
        }
    }

    let opts = PostProcessOptions {
        output: args.output.clone(),
        download_dir: cfg.download_dir.clone(),
        export_json: args.export_json.clone(),
    };
    let ctx = RunContext {
        base_url: &cfg.base_url,
        file_name: &file_name,
        scale_factor: cfg.scale_factor,
    };
    let processed = orchestrator::process_run_completion(&client, &opts, &ctx, &outcome).await;
    for msg in processed.messages {
        let _ = out_tx.send(OutputLine::Stderr(msg));
    }

    handle.shutdown();
    let _ = task.await;
    drop(handle);
    drop(out_tx);
    let _ = out_handle.await;

    if outcome.is_success() && !processed.failed {
        Ok(RunStatus::Completed)
    } else {
        Ok(RunStatus::Failed)
    }
}

/// Select, submit and wait for the upload to settle.
///
/// A rejected selection comes back as a failure outcome carrying the validation
/// message, so every path ends in something presentable.
async fn drive_upload(
    handle: &ControllerHandle,
    raw: RawFileDescriptor,
    scale: ScaleFactor,
) -> Result<UploadOutcome> {
    const STOPPED: &str = "upload controller stopped";

    handle
        .request(UiCommand::SetScale(scale))
        .await
        .context(STOPPED)?;
    let selected = handle
        .request(UiCommand::SelectFile(raw))
        .await
        .context(STOPPED)?;
    if let Some(notice) = selected.notice {
        return Ok(UploadOutcome::failure(notice));
    }

    let submitted = handle.request(UiCommand::Submit).await.context(STOPPED)?;
    if let Some(notice) = submitted.notice {
        return Ok(UploadOutcome::failure(notice));
    }
    let generation = submitted.generation;

    let mut snapshots = handle.subscribe();
    let settled = snapshots
        .wait_for(|s| s.generation != generation || !s.state.is_submitting())
        .await
        .context(STOPPED)?
        .clone();

    Ok(match settled.state {
        LifecycleState::Resulted(outcome) => outcome,
        _ => UploadOutcome::failure(
            settled
                .notice
                .unwrap_or_else(|| GENERIC_SERVICE_ERROR.to_string()),
        ),
    })
}
