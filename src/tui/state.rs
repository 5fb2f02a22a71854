use crate::model::{ModelChoice, PanelEvent, SessionView};
use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoLevel {
    Info,
    Warning,
    Error,
}

impl InfoLevel {
    pub fn color(self) -> Color {
        match self {
            InfoLevel::Info => Color::Gray,
            InfoLevel::Warning => Color::Yellow,
            InfoLevel::Error => Color::Red,
        }
    }
}

pub struct UiState {
    pub tab: usize,
    pub input: String,
    // Set when a send succeeded; the next frame starts with an empty input.
    pub pending_input_clear: bool,
    pub selected_model: ModelChoice,
    pub view: Option<SessionView>,
    pub info: String,
    pub info_level: InfoLevel,
    pub busy: Option<String>,
    pub history_scroll: u16,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            input: String::new(),
            pending_input_clear: false,
            selected_model: ModelChoice::Yi,
            view: None,
            info: String::new(),
            info_level: InfoLevel::Info,
            busy: None,
            history_scroll: 0,
        }
    }
}

impl UiState {
    /// Fold one controller event into the UI state.
    pub fn apply_event(&mut self, ev: PanelEvent) {
        match ev {
            PanelEvent::Busy(msg) => self.busy = Some(msg),
            PanelEvent::Notice(msg) => self.set_info(InfoLevel::Info, msg),
            PanelEvent::Warning(msg) => self.set_info(InfoLevel::Warning, msg),
            PanelEvent::Error(msg) => {
                self.busy = None;
                self.set_info(InfoLevel::Error, msg);
            }
            PanelEvent::View(view) => {
                self.busy = None;
                if view.clear_input {
                    self.pending_input_clear = true;
                }
                self.view = Some(*view);
            }
            PanelEvent::Closed => self.busy = None,
        }
    }

    fn set_info(&mut self, level: InfoLevel, msg: String) {
        self.info = msg;
        self.info_level = level;
    }

    /// Runs before every draw; applies a pending input clear.
    pub fn begin_frame(&mut self) {
        if self.pending_input_clear {
            self.input.clear();
            self.pending_input_clear = false;
            self.history_scroll = 0;
        }
    }

    /// Trimmed input to submit, if any. The input itself is cleared only after the send succeeds.
    pub fn submission(&self) -> Option<String> {
        let text = self.input.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    pub fn select_next_model(&mut self) -> ModelChoice {
        self.selected_model = self.selected_model.next();
        self.selected_model
    }

    pub fn select_prev_model(&mut self) -> ModelChoice {
        self.selected_model = self.selected_model.prev();
        self.selected_model
    }

    pub fn scroll_up(&mut self, by: u16) {
        self.history_scroll = self.history_scroll.saturating_sub(by);
    }

    pub fn scroll_down(&mut self, by: u16) {
        let max = self.history_line_count().saturating_sub(1) as u16;
        self.history_scroll = self.history_scroll.saturating_add(by).min(max);
    }

    fn history_line_count(&self) -> usize {
        self.view
            .as_ref()
            .map(|v| {
                v.history
                    .iter()
                    .map(|ex| ex.to_transcript().lines().count())
                    .sum()
            })
            .unwrap_or(0)
    }

    pub fn public_url(&self) -> Option<&str> {
        self.view.as_ref().map(|v| v.public_url.as_str())
    }
}

/// History pane lines, newest exchange first.
pub fn history_lines(view: &SessionView) -> Vec<Line<'static>> {
    let mut out = Vec::new();
    for ex in &view.history {
        let mut answer = ex.answer.lines();
        out.push(Line::from(vec![
            Span::styled("AI: ", Style::default().fg(Color::Green)),
            Span::raw(answer.next().unwrap_or_default().to_string()),
        ]));
        for rest in answer {
            out.push(Line::from(format!("    {rest}")));
        }
        out.push(Line::from(vec![
            Span::styled("You: ", Style::default().fg(Color::Cyan)),
            Span::raw(ex.prompt.clone()),
            Span::styled(format!("  {}", ex.at), Style::default().fg(Color::DarkGray)),
        ]));
        out.push(Line::from(""));
    }
    out
}
