mod cli;
mod config;
mod display;
mod engine;
mod error;
mod logging;
mod model;
mod orchestrator;
mod presenter;
#[cfg(feature = "tui")]
mod tui;
mod validate;

use anyhow::Result;
use clap::Parser;
use cli::RunStatus;
use logging::LogTarget;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_headless = args.is_headless();

    let target = if is_headless {
        LogTarget::Stderr
    } else {
        LogTarget::File
    };
    if let Err(e) = logging::init(target) {
        eprintln!("logging disabled: {e:#}");
    }

    match cli::run(args).await? {
        // Explicitly exit in non-TUI modes so lingering blocking tasks cannot hold the process.
        RunStatus::Completed if is_headless => std::process::exit(0),
        RunStatus::Completed => Ok(()),
        RunStatus::Failed => std::process::exit(1),
    }
}
