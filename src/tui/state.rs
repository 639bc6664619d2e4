use crate::display::DisplayUpdate;
use crate::model::ScaleFactor;
use crate::orchestrator::Snapshot;
use crate::presenter::SuccessView;
use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

/// File shown in the selection panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedSummary {
    pub name: String,
    pub size_label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub percent: f64,
    pub label: String,
}

/// Everything the UI thread draws. Owned by the UI thread only.
#[derive(Debug, Default)]
pub struct UiState {
    pub base_url: String,
    pub scale: ScaleFactor,
    pub lifecycle: &'static str,
    pub selected: Option<SelectedSummary>,
    pub progress: Option<ProgressView>,
    pub success: Option<SuccessView>,
    pub error: Option<String>,
    pub info: String,
    /// Path being typed, while the file prompt is open.
    pub input: Option<String>,
    pub show_help: bool,
}

impl UiState {
    pub fn new(base_url: impl Into<String>, scale: ScaleFactor) -> Self {
        Self {
            base_url: base_url.into(),
            scale,
            lifecycle: "idle",
            info: "Press f to choose an image, ? for help".into(),
            ..Default::default()
        }
    }

    /// Apply one render call forwarded by the controller.
    pub fn apply(&mut self, update: DisplayUpdate) {
        match update {
            DisplayUpdate::Idle => {
                self.selected = None;
                self.progress = None;
                self.success = None;
            }
            DisplayUpdate::Selected {
                name,
                size_label,
                scale,
            } => {
                self.selected = Some(SelectedSummary { name, size_label });
                self.scale = scale;
                self.success = None;
            }
            DisplayUpdate::Progress { percent, label } => {
                self.progress = Some(ProgressView { percent, label });
            }
            DisplayUpdate::ProgressHidden => self.progress = None,
            DisplayUpdate::Success(view) => {
                self.info = "Upscaled image ready. Press y to copy the download link".into();
                self.success = Some(view);
            }
            DisplayUpdate::Error(message) => self.error = Some(message),
            DisplayUpdate::ErrorCleared => self.error = None,
        }
    }

    /// Pick up controller fields that have no render call of their own.
    pub fn sync(&mut self, snapshot: &Snapshot) {
        self.scale = snapshot.scale_factor;
        self.lifecycle = snapshot.state.name();
    }

    pub fn download_url(&self) -> Option<&str> {
        self.success.as_ref().map(|v| v.download_url.as_str())
    }

    pub fn header_line(&self) -> Line<'static> {
        Line::from(vec![
            Span::styled("Service ", Style::default().fg(Color::Gray)),
            Span::styled(self.base_url.clone(), Style::default().fg(Color::Cyan)),
            Span::raw("   "),
            Span::styled("Scale ", Style::default().fg(Color::Gray)),
            Span::styled(self.scale.to_string(), Style::default().fg(Color::Magenta)),
            Span::raw("   "),
            Span::styled("State ", Style::default().fg(Color::Gray)),
            Span::styled(self.lifecycle, Style::default().fg(Color::Yellow)),
        ])
    }

    pub fn selection_lines(&self) -> Vec<Line<'static>> {
        match &self.selected {
            Some(file) => vec![Line::from(vec![
                Span::styled(file.name.clone(), Style::default().fg(Color::White)),
                Span::styled(
                    format!("  ({})", file.size_label),
                    Style::default().fg(Color::Gray),
                ),
            ])],
            None => vec![Line::from(Span::styled(
                "No file selected",
                Style::default().fg(Color::DarkGray),
            ))],
        }
    }

    pub fn result_lines(&self) -> Vec<Line<'static>> {
        let Some(view) = &self.success else {
            return Vec::new();
        };
        vec![
            kv_line(
                "Original",
                format!("{} ({})", view.original.dimensions, view.original.file_size),
            ),
            kv_line(
                "Upscaled",
                format!("{} ({})", view.upscaled.dimensions, view.upscaled.file_size),
            ),
            kv_line("Scale factor", view.scale_label.clone()),
            kv_line("Original image", view.original_image.clone()),
            kv_line("Upscaled image", view.upscaled_image.clone()),
            kv_line("Download", view.download_url.clone()),
        ]
    }
}

fn kv_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:>15}: "), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(Color::White)),
    ])
}
