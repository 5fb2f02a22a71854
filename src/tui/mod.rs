mod clipboard;
mod help;
mod state;

use crate::cli::Cli;
use crate::model::{PanelEvent, StatusColor};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use clipboard::copy_to_clipboard;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use help::draw_help;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{history_lines, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// What a key press asks for.
#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    None,
    Command(UiCommand),
    CopyUrl,
    Quit,
}

pub async fn run(args: Cli) -> Result<()> {
    // Open the session (and the tunnel) before taking over the terminal, so a startup
    // failure is printed normally.
    let session = crate::cli::open_session(&args).await?;

    let (event_tx, event_rx) = mpsc::unbounded_channel::<PanelEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, event_rx, cmd_tx));

    let res = orchestrator::run_controller(session, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    args: Cli,
    mut event_rx: UnboundedReceiver<PanelEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        selected_model: args.model,
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now() - tick_rate;
    let mut frame: usize = 0;

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            state.begin_frame();
            frame = frame.wrapping_add(1);
            terminal.draw(|f| draw(f.area(), f, &state, frame)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match handle_key(&mut state, k) {
                    KeyAction::None => {}
                    KeyAction::Command(cmd) => {
                        let _ = cmd_tx.send(cmd);
                    }
                    KeyAction::CopyUrl => match state.public_url().map(copy_to_clipboard) {
                        Some(Ok(())) => state.info = "✓ Public URL copied to clipboard".into(),
                        Some(Err(e)) => state.info = format!("Clipboard copy failed: {e:#}"),
                        None => state.info = "No public URL yet".into(),
                    },
                    KeyAction::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Map a key press to an action, editing the input buffer in place.
fn handle_key(state: &mut UiState, k: KeyEvent) -> KeyAction {
    let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);
    match k.code {
        KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('c') if ctrl => KeyAction::Quit,
        KeyCode::Char('s') if ctrl => {
            state.info = "Starting server…".into();
            KeyAction::Command(UiCommand::Start)
        }
        KeyCode::Char('x') if ctrl => KeyAction::Command(UiCommand::Stop),
        KeyCode::Char('n') if ctrl => {
            KeyAction::Command(UiCommand::SelectModel(state.select_next_model()))
        }
        KeyCode::Char('p') if ctrl => {
            KeyAction::Command(UiCommand::SelectModel(state.select_prev_model()))
        }
        KeyCode::Char('r') if ctrl => KeyAction::Command(UiCommand::Refresh),
        KeyCode::Char('y') if ctrl => KeyAction::CopyUrl,
        KeyCode::Tab | KeyCode::F(1) => {
            state.tab = (state.tab + 1) % 2;
            KeyAction::None
        }
        KeyCode::PageUp | KeyCode::Up => {
            state.scroll_up(if k.code == KeyCode::Up { 1 } else { 10 });
            KeyAction::None
        }
        KeyCode::PageDown | KeyCode::Down => {
            state.scroll_down(if k.code == KeyCode::Down { 1 } else { 10 });
            KeyAction::None
        }
        KeyCode::Enter => match state.submission() {
            Some(prompt) => KeyAction::Command(UiCommand::Send(prompt)),
            None => KeyAction::None,
        },
        KeyCode::Backspace => {
            state.input.pop();
            KeyAction::None
        }
        KeyCode::Char(c) if !ctrl => {
            state.input.push(c);
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState, frame: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Panel"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("ollama-panel"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_panel(chunks[1], f, state, frame),
        _ => draw_help(chunks[1], f),
    }
}

fn draw_panel(area: Rect, f: &mut ratatui::Frame, state: &UiState, frame: usize) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(5), // Status, URL, model selector
                Constraint::Min(5),    // History
                Constraint::Length(3), // Input
                Constraint::Length(3), // Info line
            ]
            .as_ref(),
        )
        .split(area);

    draw_status(main[0], f, state);
    draw_history(main[1], f, state);
    draw_input(main[2], f, state);
    draw_info(main[3], f, state, frame);
}

fn status_color(c: StatusColor) -> Color {
    match c {
        StatusColor::Green => Color::Green,
        StatusColor::Red => Color::Red,
    }
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let (status_span, pid) = match &state.view {
        Some(v) => (
            Span::styled(
                v.status.label(),
                Style::default()
                    .fg(status_color(v.status.color()))
                    .add_modifier(Modifier::BOLD),
            ),
            v.pid.map(|p| format!("  (pid {p})")).unwrap_or_default(),
        ),
        None => (
            Span::styled("Checking…", Style::default().fg(Color::Gray)),
            String::new(),
        ),
    };

    let mut model_spans = vec![Span::styled("Model: ", Style::default().fg(Color::Gray))];
    for m in crate::model::ModelChoice::ALL {
        let style = if m == state.selected_model {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        model_spans.push(Span::styled(format!(" {} ", m.label()), style));
        model_spans.push(Span::raw(" "));
    }
    let active = state
        .view
        .as_ref()
        .and_then(|v| v.active_model.clone())
        .unwrap_or_else(|| "none".into());
    model_spans.push(Span::styled(
        format!("(active: {active})"),
        Style::default().fg(Color::DarkGray),
    ));

    let lines = vec![
        Line::from(vec![
            Span::styled("Server Status: ", Style::default().fg(Color::Gray)),
            status_span,
            Span::raw(pid),
        ]),
        Line::from(vec![
            Span::styled("Public URL: ", Style::default().fg(Color::Gray)),
            Span::styled(
                state.public_url().unwrap_or("-").to_string(),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(model_spans),
    ];
    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Server (Ctrl-S start, Ctrl-X stop, Ctrl-N/P model)"),
    );
    f.render_widget(p, area);
}

fn draw_history(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("History");
    let lines = state.view.as_ref().map(history_lines).unwrap_or_default();
    if lines.is_empty() {
        let p = Paragraph::new("No messages yet.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(p, area);
        return;
    }
    let p = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((state.history_scroll, 0));
    f.render_widget(p, area);
}

fn draw_input(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Message (Enter to send)");
    let line = if state.input.is_empty() {
        Line::from(Span::styled(
            "Type your message...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(vec![
            Span::raw(state.input.clone()),
            Span::styled("█", Style::default().fg(Color::Gray)),
        ])
    };
    // Keep the tail of long input visible.
    let inner_width = area.width.saturating_sub(2) as usize;
    let overflow = state.input.chars().count().saturating_sub(inner_width.saturating_sub(1));
    let p = Paragraph::new(line)
        .block(block)
        .scroll((0, overflow.min(u16::MAX as usize) as u16));
    f.render_widget(p, area);
}

fn draw_info(area: Rect, f: &mut ratatui::Frame, state: &UiState, frame: usize) {
    let line = match &state.busy {
        Some(msg) => Line::from(vec![
            Span::styled(
                format!("{} ", SPINNER[frame % SPINNER.len()]),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(msg.clone()),
        ]),
        None => Line::from(Span::styled(
            state.info.clone(),
            Style::default().fg(state.info_level.color()),
        )),
    };
    let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelChoice;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn typing_then_enter_sends_trimmed_prompt_without_clearing() {
        let mut state = UiState::default();
        for c in " hi there".chars() {
            assert_eq!(handle_key(&mut state, key(KeyCode::Char(c))), KeyAction::None);
        }
        handle_key(&mut state, key(KeyCode::Backspace));
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Enter)),
            KeyAction::Command(UiCommand::Send("hi ther".into()))
        );
        // Cleared only once the controller reports success.
        assert_eq!(state.input, " hi ther");
    }

    #[test]
    fn enter_on_empty_input_does_nothing() {
        let mut state = UiState::default();
        assert_eq!(handle_key(&mut state, key(KeyCode::Enter)), KeyAction::None);
    }

    #[test]
    fn control_keys_map_to_commands() {
        let mut state = UiState::default();
        assert_eq!(
            handle_key(&mut state, ctrl('s')),
            KeyAction::Command(UiCommand::Start)
        );
        assert_eq!(
            handle_key(&mut state, ctrl('x')),
            KeyAction::Command(UiCommand::Stop)
        );
        assert_eq!(
            handle_key(&mut state, ctrl('n')),
            KeyAction::Command(UiCommand::SelectModel(ModelChoice::Mistral))
        );
        assert_eq!(handle_key(&mut state, ctrl('y')), KeyAction::CopyUrl);
        assert_eq!(handle_key(&mut state, ctrl('c')), KeyAction::Quit);
        assert_eq!(handle_key(&mut state, key(KeyCode::Esc)), KeyAction::Quit);
        // Control chords never leak into the input.
        assert!(state.input.is_empty());
    }

    #[test]
    fn tab_toggles_help() {
        let mut state = UiState::default();
        handle_key(&mut state, key(KeyCode::Tab));
        assert_eq!(state.tab, 1);
        handle_key(&mut state, key(KeyCode::F(1)));
        assert_eq!(state.tab, 0);
    }
}
