use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const KEYBINDS: [(&str, &str); 8] = [
    ("q / Ctrl-C", "Quit"),
    ("f / o", "Choose an image file"),
    ("Enter / u", "Upload and upscale"),
    ("s", "Switch scale factor (2x / 4x)"),
    ("n", "Start over"),
    ("Esc", "Dismiss error"),
    ("y", "Copy download link to clipboard"),
    ("?", "Toggle this help"),
];

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![Line::from("Keybinds:")];
    lines.extend(KEYBINDS.iter().map(|(key, action)| {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{key:<12}"), Style::default().fg(Color::Magenta)),
            Span::raw(*action),
        ])
    }));
    lines.push(Line::from(""));
    lines.push(Line::from(
        "Accepted: PNG, JPG, JPEG, WebP up to 16MB. Logs go to the data directory.",
    ));

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
