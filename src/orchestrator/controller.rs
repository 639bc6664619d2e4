//! Upload lifecycle controller.
//!
//! A single task owns the [`LifecycleState`] and is the only writer of it. Commands
//! from front-ends, progress ticks and settled uploads all arrive as messages and are
//! applied one at a time in the `select!` loop, so no locking is needed.
//!
//! Every submission is tagged with a generation number. Reset, re-selection and new
//! submissions advance the generation; ticks and responses carrying an older one are
//! dropped on arrival. The HTTP request itself is never aborted.

use crate::display::DisplayPort;
use crate::engine::{ProgressPhase, ProgressReporter, ProgressTick, UploadService, COMPLETE};
use crate::model::{
    ClientConfig, LifecycleState, RawFileDescriptor, ScaleFactor, UploadOutcome, UploadRequest,
};
use crate::presenter::{present, DisplayModel};
use crate::validate::validate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const NO_FILE_MESSAGE: &str = "Please select an image file first.";

/// Commands emitted by front-ends.
#[derive(Debug, Clone)]
pub enum UiCommand {
    SelectFile(RawFileDescriptor),
    SetScale(ScaleFactor),
    Submit,
    Reset,
    DismissError,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub progress_interval: Duration,
    pub teardown_delay: Duration,
    pub initial_scale: ScaleFactor,
}

impl From<&ClientConfig> for ControllerSettings {
    fn from(cfg: &ClientConfig) -> Self {
        Self {
            progress_interval: cfg.progress_interval,
            teardown_delay: cfg.teardown_delay,
            initial_scale: cfg.scale_factor,
        }
    }
}

/// Read-only view of the controller, published after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub state: LifecycleState,
    pub scale_factor: ScaleFactor,
    /// Current dismissible error message, if any.
    pub notice: Option<String>,
    pub generation: u64,
}

struct Envelope {
    command: UiCommand,
    ack: Option<oneshot::Sender<Snapshot>>,
}

/// Cloneable front-end handle to a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    cmd_tx: UnboundedSender<Envelope>,
    snapshot_rx: watch::Receiver<Snapshot>,
}

impl ControllerHandle {
    /// Queue a command without waiting. Returns `false` once the controller is gone.
    pub fn send(&self, command: UiCommand) -> bool {
        self.cmd_tx.send(Envelope { command, ack: None }).is_ok()
    }

    /// Queue a command and wait for the snapshot taken right after it was applied.
    pub async fn request(&self, command: UiCommand) -> Option<Snapshot> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(Envelope {
                command,
                ack: Some(ack_tx),
            })
            .ok()?;
        ack_rx.await.ok()
    }

    pub fn select_file(&self, raw: RawFileDescriptor) -> bool {
        self.send(UiCommand::SelectFile(raw))
    }

    pub fn set_scale(&self, scale: ScaleFactor) -> bool {
        self.send(UiCommand::SetScale(scale))
    }

    /// The single submission entry point.
    pub fn submit(&self) -> bool {
        self.send(UiCommand::Submit)
    }

    pub fn reset(&self) -> bool {
        self.send(UiCommand::Reset)
    }

    pub fn dismiss_error(&self) -> bool {
        self.send(UiCommand::DismissError)
    }

    pub fn shutdown(&self) -> bool {
        self.send(UiCommand::Shutdown)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }
}

enum Internal {
    Tick {
        generation: u64,
        tick: ProgressTick,
    },
    Settled {
        generation: u64,
        outcome: UploadOutcome,
    },
}

/// A successful upload waiting out the completion delay before it is shown.
struct Finishing {
    generation: u64,
    deadline: Instant,
    outcome: UploadOutcome,
}

struct UploadController<D> {
    settings: ControllerSettings,
    service: Arc<dyn UploadService>,
    display: D,
    state: LifecycleState,
    scale: ScaleFactor,
    notice: Option<String>,
    generation: u64,
    reporter: Option<ProgressReporter>,
    finishing: Option<Finishing>,
    internal_tx: UnboundedSender<Internal>,
    snapshot_tx: watch::Sender<Snapshot>,
}

/// Start a controller task and return its handle.
pub fn spawn_controller<D>(
    service: Arc<dyn UploadService>,
    display: D,
    settings: ControllerSettings,
) -> (ControllerHandle, JoinHandle<()>)
where
    D: DisplayPort + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Envelope>();
    let (internal_tx, internal_rx) = mpsc::unbounded_channel::<Internal>();
    let initial = Snapshot {
        scale_factor: settings.initial_scale,
        ..Default::default()
    };
    let (snapshot_tx, snapshot_rx) = watch::channel(initial);

    let mut controller = UploadController {
        settings,
        service,
        display,
        state: LifecycleState::Idle,
        scale: settings.initial_scale,
        notice: None,
        generation: 0,
        reporter: None,
        finishing: None,
        internal_tx,
        snapshot_tx,
    };
    controller.display.render_idle();

    let handle = tokio::spawn(controller.run(cmd_rx, internal_rx));
    (
        ControllerHandle {
            cmd_tx,
            snapshot_rx,
        },
        handle,
    )
}

impl<D: DisplayPort> UploadController<D> {
    async fn run(
        mut self,
        mut cmd_rx: UnboundedReceiver<Envelope>,
        mut internal_rx: UnboundedReceiver<Internal>,
    ) {
        loop {
            let finish_at = self.finishing.as_ref().map(|f| f.deadline);
            tokio::select! {
                envelope = cmd_rx.recv() => {
                    let Some(Envelope { command, ack }) = envelope else {
                        debug!("all controller handles dropped");
                        break;
                    };
                    let keep_running = self.apply_command(command);
                    self.publish();
                    if let Some(ack) = ack {
                        let _ = ack.send(self.snapshot_tx.borrow().clone());
                    }
                    if !keep_running {
                        break;
                    }
                }
                Some(event) = internal_rx.recv() => {
                    self.apply_internal(event);
                    self.publish();
                }
                _ = async move {
                    match finish_at {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => futures::future::pending().await,
                    }
                } => {
                    self.finish();
                    self.publish();
                }
            }
        }
        self.stop_reporter();
        debug!("controller stopped");
    }

    fn apply_command(&mut self, command: UiCommand) -> bool {
        match command {
            UiCommand::SelectFile(raw) => self.select_file(raw),
            UiCommand::SetScale(scale) => self.set_scale(scale),
            UiCommand::Submit => self.submit(),
            UiCommand::Reset => self.reset(),
            UiCommand::DismissError => self.clear_notice(),
            UiCommand::Shutdown => return false,
        }
        true
    }

    fn apply_internal(&mut self, event: Internal) {
        match event {
            Internal::Tick { generation, tick } => self.on_tick(generation, tick),
            Internal::Settled {
                generation,
                outcome,
            } => self.on_settled(generation, outcome),
        }
    }

    fn select_file(&mut self, raw: RawFileDescriptor) {
        let name = raw.name.clone();
        let file = match validate(raw) {
            Ok(file) => file,
            Err(e) => {
                warn!(file = %name, error = ?e, "rejected selection");
                self.show_error(e.to_string());
                return;
            }
        };

        if self.state.is_submitting() {
            debug!(generation = self.generation, "selection supersedes in-flight upload");
            self.generation += 1;
            self.stop_reporter();
            self.finishing = None;
            self.display.hide_progress();
        }
        self.clear_notice();
        info!(file = %file.name(), bytes = file.size_bytes(), "file selected");
        self.display.render_selected(&file, self.scale);
        self.state = LifecycleState::FileSelected(file);
    }

    fn set_scale(&mut self, scale: ScaleFactor) {
        self.scale = scale;
        if let LifecycleState::FileSelected(file) = &self.state {
            self.display.render_selected(file, scale);
        }
    }

    fn submit(&mut self) {
        let file = match &self.state {
            LifecycleState::FileSelected(file) => file.clone(),
            LifecycleState::Submitting { .. } => {
                debug!(
                    generation = self.generation,
                    "upload already in flight; ignoring submit"
                );
                return;
            }
            LifecycleState::Idle | LifecycleState::Resulted(_) => {
                self.show_error(NO_FILE_MESSAGE.to_string());
                return;
            }
        };

        self.generation += 1;
        let generation = self.generation;
        let request = UploadRequest {
            file,
            scale_factor: self.scale,
        };
        info!(
            generation,
            file = %request.file.name(),
            scale = %request.scale_factor,
            "submitting upload"
        );

        self.clear_notice();
        self.state = LifecycleState::Submitting {
            request: request.clone(),
            progress: 0.0,
        };
        self.display
            .render_progress(0.0, ProgressPhase::for_percent(0.0).label());

        let tick_tx = self.internal_tx.clone();
        self.reporter = Some(ProgressReporter::start(
            self.settings.progress_interval,
            move |tick| tick_tx.send(Internal::Tick { generation, tick }).is_ok(),
        ));

        let service = Arc::clone(&self.service);
        let settled_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let outcome = service.submit(request).await;
            let _ = settled_tx.send(Internal::Settled {
                generation,
                outcome,
            });
        });
    }

    fn on_tick(&mut self, generation: u64, tick: ProgressTick) {
        if generation != self.generation || self.finishing.is_some() {
            return;
        }
        if let LifecycleState::Submitting { progress, .. } = &mut self.state {
            *progress = progress.max(tick.percent);
            let percent = *progress;
            self.display.render_progress(percent, tick.phase.label());
        }
    }

    fn on_settled(&mut self, generation: u64, outcome: UploadOutcome) {
        if generation != self.generation || !self.state.is_submitting() {
            debug!(
                generation,
                current = self.generation,
                state = self.state.name(),
                "discarding stale upload response"
            );
            return;
        }
        self.stop_reporter();

        match outcome {
            UploadOutcome::Success(_) => {
                if let LifecycleState::Submitting { progress, .. } = &mut self.state {
                    *progress = COMPLETE;
                }
                self.display
                    .render_progress(COMPLETE, ProgressPhase::for_percent(COMPLETE).label());
                self.finishing = Some(Finishing {
                    generation,
                    deadline: Instant::now() + self.settings.teardown_delay,
                    outcome,
                });
            }
            UploadOutcome::Failure { .. } => {
                let previous = std::mem::take(&mut self.state);
                let LifecycleState::Submitting { request, .. } = previous else {
                    self.state = previous;
                    return;
                };
                self.display.hide_progress();
                self.display.render_selected(&request.file, self.scale);
                if let DisplayModel::Error { message } = present(&outcome) {
                    self.show_error(message);
                }
                self.state = LifecycleState::FileSelected(request.file);
            }
        }
    }

    fn finish(&mut self) {
        let Some(finishing) = self.finishing.take() else {
            return;
        };
        if finishing.generation != self.generation {
            return;
        }
        self.display.hide_progress();
        match present(&finishing.outcome) {
            DisplayModel::Success(view) => self.display.render_success(&view),
            DisplayModel::Error { message } => self.show_error(message),
        }
        info!(generation = finishing.generation, "upload result ready");
        self.state = LifecycleState::Resulted(finishing.outcome);
    }

    fn reset(&mut self) {
        debug!(
            generation = self.generation,
            state = self.state.name(),
            "resetting"
        );
        self.generation += 1;
        self.stop_reporter();
        self.finishing = None;
        self.state = LifecycleState::Idle;
        self.clear_notice();
        self.display.hide_progress();
        self.display.render_idle();
    }

    fn stop_reporter(&mut self) {
        if let Some(reporter) = self.reporter.take() {
            reporter.stop();
        }
    }

    fn show_error(&mut self, message: String) {
        self.display.render_error(&message);
        self.notice = Some(message);
    }

    fn clear_notice(&mut self) {
        if self.notice.take().is_some() {
            self.display.clear_error();
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Snapshot {
            state: self.state.clone(),
            scale_factor: self.scale,
            notice: self.notice.clone(),
            generation: self.generation,
        });
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
