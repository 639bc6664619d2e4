mod clipboard;
mod help;
mod state;

use crate::cli::Cli;
use crate::display::{ChannelDisplay, DisplayUpdate};
use crate::engine::{UploadClient, UploadService};
use crate::model::{ClientConfig, RawFileDescriptor};
use crate::orchestrator::{self, ControllerHandle, ControllerSettings};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Terminal,
};
use state::UiState;
use std::path::Path;
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub async fn run(args: Cli, cfg: ClientConfig) -> Result<()> {
    let (update_tx, update_rx) = mpsc::unbounded_channel::<DisplayUpdate>();
    let service: Arc<dyn UploadService> = Arc::new(UploadClient::new(&cfg)?);
    let (handle, task) = orchestrator::spawn_controller(
        service,
        ChannelDisplay::new(update_tx),
        ControllerSettings::from(&cfg),
    );

    let mut ui = UiState::new(cfg.base_url.clone(), cfg.scale_factor);
    if let Some(path) = args.file.as_deref() {
        select_path(&handle, path, &mut ui);
    }

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = handle.clone();
    let ui_thread = std::thread::spawn(move || run_threaded(ui, update_rx, ui_handle));

    let join_res = tokio::task::spawn_blocking(move || ui_thread.join()).await;
    handle.shutdown();
    let _ = task.await;

    match join_res {
        Ok(Ok(res)) => res,
        Ok(Err(_)) => Err(anyhow::anyhow!("TUI thread panicked")),
        Err(e) => Err(e).context("join TUI thread"),
    }
}

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Quit,
    OpenPrompt,
    Submit,
    ToggleScale,
    Reset,
    DismissError,
    CopyDownloadLink,
    ToggleHelp,
    PromptChar(char),
    PromptBackspace,
    PromptCancel,
    PromptConfirm,
    Ignore,
}

fn map_key(prompt_open: bool, k: KeyEvent) -> KeyAction {
    if let (KeyModifiers::CONTROL, KeyCode::Char('c')) = (k.modifiers, k.code) {
        return KeyAction::Quit;
    }
    if prompt_open {
        return match k.code {
            KeyCode::Enter => KeyAction::PromptConfirm,
            KeyCode::Esc => KeyAction::PromptCancel,
            KeyCode::Backspace => KeyAction::PromptBackspace,
            KeyCode::Char(c) => KeyAction::PromptChar(c),
            _ => KeyAction::Ignore,
        };
    }
    match k.code {
        KeyCode::Char('q') => KeyAction::Quit,
        KeyCode::Char('f') | KeyCode::Char('o') => KeyAction::OpenPrompt,
        KeyCode::Enter | KeyCode::Char('u') => KeyAction::Submit,
        KeyCode::Char('s') => KeyAction::ToggleScale,
        KeyCode::Char('n') => KeyAction::Reset,
        KeyCode::Esc => KeyAction::DismissError,
        KeyCode::Char('y') => KeyAction::CopyDownloadLink,
        KeyCode::Char('?') => KeyAction::ToggleHelp,
        _ => KeyAction::Ignore,
    }
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut update_rx: UnboundedReceiver<DisplayUpdate>,
    handle: ControllerHandle,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut redraw = true;

    let res = loop {
        // Drain updates without blocking to keep the UI responsive.
        while let Ok(update) = update_rx.try_recv() {
            state.apply(update);
        }

        if redraw || last_tick.elapsed() >= tick_rate {
            state.sync(&handle.snapshot());
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
            redraw = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if !event::poll(Duration::from_millis(10)).unwrap_or(false) {
            continue;
        }
        let Ok(Event::Key(k)) = event::read() else {
            continue;
        };
        if k.kind != KeyEventKind::Press {
            continue;
        }

        match map_key(state.input.is_some(), k) {
            KeyAction::Quit => break Ok(()),
            KeyAction::OpenPrompt => {
                state.input = Some(String::new());
                state.show_help = false;
            }
            KeyAction::PromptChar(c) => {
                if let Some(input) = state.input.as_mut() {
                    input.push(c);
                }
            }
            KeyAction::PromptBackspace => {
                if let Some(input) = state.input.as_mut() {
                    input.pop();
                }
            }
            KeyAction::PromptCancel => state.input = None,
            KeyAction::PromptConfirm => {
                let typed = state.input.take().unwrap_or_default();
                let typed = typed.trim();
                if !typed.is_empty() {
                    select_path(&handle, Path::new(typed), &mut state);
                }
            }
            KeyAction::Submit => {
                handle.submit();
            }
            KeyAction::ToggleScale => {
                let next = handle.snapshot().scale_factor.next();
                handle.set_scale(next);
                state.info = format!("Scale factor set to {next}");
            }
            KeyAction::Reset => {
                handle.reset();
                state.info = "Cleared. Press f to choose another image".into();
            }
            KeyAction::DismissError => {
                handle.dismiss_error();
            }
            KeyAction::CopyDownloadLink => match state.download_url().map(str::to_string) {
                Some(url) => {
                    state.info = match clipboard::copy(&url) {
                        Ok(()) => format!("✓ Copied to clipboard: {url}"),
                        Err(e) => format!("Clipboard copy failed: {e:#}"),
                    };
                }
                None => state.info = "No download link yet. Upload an image first".into(),
            },
            KeyAction::ToggleHelp => state.show_help = !state.show_help,
            KeyAction::Ignore => {}
        }
        redraw = true;
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Describe a file from disk and hand it to the controller, which validates it.
fn select_path(handle: &ControllerHandle, path: &Path, state: &mut UiState) {
    match RawFileDescriptor::from_path(path) {
        Ok(raw) => {
            handle.select_file(raw);
            state.info = "Press Enter to upload, s to switch scale".into();
        }
        Err(e) => state.info = format!("Cannot open {}: {e}", path.display()),
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(3),
        ])
        .split(area);

    let header = Paragraph::new(state.header_line()).block(
        Block::default()
            .borders(Borders::ALL)
            .title("image-upscaler"),
    );
    f.render_widget(header, chunks[0]);

    let selection = Paragraph::new(state.selection_lines())
        .block(Block::default().borders(Borders::ALL).title("Image"));
    f.render_widget(selection, chunks[1]);

    draw_progress(chunks[2], f, state);

    let result = Paragraph::new(state.result_lines())
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Result"));
    f.render_widget(result, chunks[3]);

    draw_footer(chunks[4], f, state);

    if state.show_help {
        help::draw_help(chunks[3], f);
    }
}

fn draw_progress(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Progress");
    match &state.progress {
        Some(progress) => {
            let gauge = Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(Color::Green))
                .ratio((progress.percent / 100.0).clamp(0.0, 1.0))
                .label(format!("{} {:.0}%", progress.label, progress.percent));
            f.render_widget(gauge, area);
        }
        None => f.render_widget(Paragraph::new("").block(block), area),
    }
}

fn draw_footer(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let line = if let Some(input) = &state.input {
        Line::from(vec![
            Span::styled("Path: ", Style::default().fg(Color::Magenta)),
            Span::raw(input.clone()),
            Span::styled("█", Style::default().fg(Color::Gray)),
        ])
    } else if let Some(error) = &state.error {
        Line::from(vec![
            Span::styled("Error: ", Style::default().fg(Color::Red)),
            Span::styled(error.clone(), Style::default().fg(Color::Red)),
            Span::styled("  (Esc to dismiss)", Style::default().fg(Color::DarkGray)),
        ])
    } else {
        Line::from(Span::styled(
            state.info.clone(),
            Style::default().fg(Color::Gray),
        ))
    };
    let footer = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn keys_map_to_controller_actions() {
        assert_eq!(map_key(false, key(KeyCode::Char('q'))), KeyAction::Quit);
        assert_eq!(map_key(false, key(KeyCode::Char('f'))), KeyAction::OpenPrompt);
        assert_eq!(map_key(false, key(KeyCode::Enter)), KeyAction::Submit);
        assert_eq!(map_key(false, key(KeyCode::Char('u'))), KeyAction::Submit);
        assert_eq!(map_key(false, key(KeyCode::Char('s'))), KeyAction::ToggleScale);
        assert_eq!(map_key(false, key(KeyCode::Char('n'))), KeyAction::Reset);
        assert_eq!(map_key(false, key(KeyCode::Esc)), KeyAction::DismissError);
        assert_eq!(map_key(false, key(KeyCode::Char('x'))), KeyAction::Ignore);
    }

    #[test]
    fn prompt_captures_plain_keys() {
        assert_eq!(
            map_key(true, key(KeyCode::Char('q'))),
            KeyAction::PromptChar('q')
        );
        assert_eq!(map_key(true, key(KeyCode::Enter)), KeyAction::PromptConfirm);
        assert_eq!(map_key(true, key(KeyCode::Esc)), KeyAction::PromptCancel);
        assert_eq!(
            map_key(true, key(KeyCode::Backspace)),
            KeyAction::PromptBackspace
        );
    }

    #[test]
    fn ctrl_c_always_quits() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(true, ctrl_c), KeyAction::Quit);
        assert_eq!(map_key(false, ctrl_c), KeyAction::Quit);
    }
}
