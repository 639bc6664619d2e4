//! Application-level orchestration.
//!
//! This module owns the upload lifecycle (select, submit, reset) and post-run
//! processing such as downloads and exports. UI/CLI layers call into this module to
//! keep responsibilities separated.

mod controller;
mod post_process;

pub(crate) use controller::{
    spawn_controller, ControllerHandle, ControllerSettings, Snapshot, UiCommand,
};
pub(crate) use post_process::{process_run_completion, PostProcessOptions, RunContext};
