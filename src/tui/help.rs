use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        key_line("Esc", 3, " / Ctrl-C  Quit (stops a server started here)"),
        key_line("Ctrl-S", 8, "Start server"),
        key_line("Ctrl-X", 8, "Stop server"),
        key_line("Ctrl-N", 8, "Next model"),
        key_line("Ctrl-P", 8, "Previous model"),
        key_line("Enter", 9, "Send message"),
        key_line("Ctrl-R", 8, "Refresh status"),
        key_line("Ctrl-Y", 8, "Copy public URL to clipboard"),
        key_line("PgUp/PgDn", 5, "Scroll history"),
        key_line("Tab / F1", 6, "Switch tabs"),
        Line::from(""),
        Line::from("Messages are sent as \"Answer concisely: <message>\" to the active model."),
        Line::from("Switching models unloads the previous one first."),
        Line::from(""),
        Line::from("Environment:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("ngrok_auth_key", Style::default().fg(Color::Cyan)),
            Span::raw("  tunnel auth token (see --token-env)"),
        ]),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("RUST_LOG", Style::default().fg(Color::Cyan)),
            Span::raw("        log filter for the log file (default info)"),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
