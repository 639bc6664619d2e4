//! Rendering surfaces driven by the upload controller.
//!
//! The controller never touches a terminal directly; it writes into a [`DisplayPort`]
//! injected at construction time.

use crate::cli::OutputLine;
use crate::model::{ScaleFactor, SelectedFile};
use crate::presenter::{format_file_size, SuccessView};
use tokio::sync::mpsc::UnboundedSender;

pub trait DisplayPort: Send {
    fn render_idle(&mut self);
    fn render_selected(&mut self, file: &SelectedFile, scale: ScaleFactor);
    fn render_progress(&mut self, percent: f64, label: &str);
    fn hide_progress(&mut self);
    fn render_success(&mut self, view: &SuccessView);
    fn render_error(&mut self, message: &str);
    fn clear_error(&mut self);
}

/// One display slot update, as forwarded by [`ChannelDisplay`].
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    Idle,
    Selected {
        name: String,
        size_label: String,
        scale: ScaleFactor,
    },
    Progress {
        percent: f64,
        label: String,
    },
    ProgressHidden,
    Success(SuccessView),
    Error(String),
    ErrorCleared,
}

/// Forwards every render call over a channel, for front-ends that draw on their
/// own thread.
pub struct ChannelDisplay {
    tx: UnboundedSender<DisplayUpdate>,
}

impl ChannelDisplay {
    pub fn new(tx: UnboundedSender<DisplayUpdate>) -> Self {
        Self { tx }
    }

    fn send(&self, update: DisplayUpdate) {
        // The receiver going away means the UI closed; the controller keeps running
        // until it is told to shut down.
        let _ = self.tx.send(update);
    }
}

impl DisplayPort for ChannelDisplay {
    fn render_idle(&mut self) {
        self.send(DisplayUpdate::Idle);
    }

    fn render_selected(&mut self, file: &SelectedFile, scale: ScaleFactor) {
        self.send(DisplayUpdate::Selected {
            name: file.name().to_string(),
            size_label: format_file_size(file.size_bytes()),
            scale,
        });
    }

    fn render_progress(&mut self, percent: f64, label: &str) {
        self.send(DisplayUpdate::Progress {
            percent,
            label: label.to_string(),
        });
    }

    fn hide_progress(&mut self) {
        self.send(DisplayUpdate::ProgressHidden);
    }

    fn render_success(&mut self, view: &SuccessView) {
        self.send(DisplayUpdate::Success(view.clone()));
    }

    fn render_error(&mut self, message: &str) {
        self.send(DisplayUpdate::Error(message.to_string()));
    }

    fn clear_error(&mut self) {
        self.send(DisplayUpdate::ErrorCleared);
    }
}

/// Line-oriented display for text and JSON modes. Everything goes to stderr so
/// stdout carries only the final result.
pub struct TextDisplay {
    out: UnboundedSender<OutputLine>,
    show_progress: bool,
    last_label: Option<String>,
}

impl TextDisplay {
    pub fn new(out: UnboundedSender<OutputLine>, show_progress: bool) -> Self {
        Self {
            out,
            show_progress,
            last_label: None,
        }
    }

    fn line(&self, msg: String) {
        let _ = self.out.send(OutputLine::Stderr(msg));
    }
}

impl DisplayPort for TextDisplay {
    fn render_idle(&mut self) {
        self.last_label = None;
    }

    fn render_selected(&mut self, file: &SelectedFile, scale: ScaleFactor) {
        self.line(format!(
            "Selected {} ({}), scale {}",
            file.name(),
            format_file_size(file.size_bytes()),
            scale
        ));
    }

    fn render_progress(&mut self, percent: f64, label: &str) {
        if !self.show_progress {
            return;
        }
        if self.last_label.as_deref() != Some(label) {
            self.line(format!("== {label} =="));
            self.last_label = Some(label.to_string());
        }
        self.line(format!("Progress: {percent:.0}%"));
    }

    fn hide_progress(&mut self) {
        self.last_label = None;
    }

    fn render_success(&mut self, _view: &SuccessView) {
        self.line("Upscaled image ready".to_string());
    }

    fn render_error(&mut self, message: &str) {
        self.line(format!("Error: {message}"));
    }

    fn clear_error(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawFileDescriptor;
    use crate::validate::validate;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    fn selected() -> SelectedFile {
        validate(RawFileDescriptor::from_bytes(
            "cat.webp",
            "image/webp",
            Bytes::from(vec![0u8; 1536]),
        ))
        .unwrap()
    }

    #[test]
    fn channel_display_forwards_updates_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut display = ChannelDisplay::new(tx);

        display.render_selected(&selected(), ScaleFactor::X4);
        display.render_progress(12.0, "Uploading image...");
        display.hide_progress();
        display.render_error("network error");
        display.clear_error();

        assert_eq!(
            rx.try_recv().unwrap(),
            DisplayUpdate::Selected {
                name: "cat.webp".into(),
                size_label: "1.5 KB".into(),
                scale: ScaleFactor::X4,
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            DisplayUpdate::Progress {
                percent: 12.0,
                label: "Uploading image...".into()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), DisplayUpdate::ProgressHidden);
        assert_eq!(
            rx.try_recv().unwrap(),
            DisplayUpdate::Error("network error".into())
        );
        assert_eq!(rx.try_recv().unwrap(), DisplayUpdate::ErrorCleared);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn text_display_prints_phase_headers_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut display = TextDisplay::new(tx, true);

        display.render_progress(5.0, "Uploading image...");
        display.render_progress(20.0, "Uploading image...");
        display.render_progress(35.0, "Processing image...");

        let mut lines = Vec::new();
        while let Ok(OutputLine::Stderr(line)) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(
            lines,
            vec![
                "== Uploading image... ==",
                "Progress: 5%",
                "Progress: 20%",
                "== Processing image... ==",
                "Progress: 35%",
            ]
        );
    }

    #[test]
    fn quiet_text_display_skips_progress() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut display = TextDisplay::new(tx, false);
        display.render_progress(50.0, "Processing image...");
        assert!(rx.try_recv().is_err());
    }
}
