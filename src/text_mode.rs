//! Line-oriented text mode.
//!
//! Parses stdin lines into controller commands and turns controller events into output lines.

use crate::cli::OutputLine;
use crate::model::{ModelChoice, PanelEvent, SessionView};
use crate::orchestrator::UiCommand;

pub(crate) const HELP: &str = "Commands: start | stop | model <Yi|Mistral|Llama3.2|Tinyllama> | status | refresh | history | help | quit\nAny other line is sent to the active model.";

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TextInput {
    Command(UiCommand),
    ShowStatus,
    ShowHistory,
    Help,
    Invalid(String),
    Empty,
}

pub(crate) fn parse_line(line: &str) -> TextInput {
    let line = line.trim();
    if line.is_empty() {
        return TextInput::Empty;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };
    match (word.to_lowercase().as_str(), rest) {
        ("start", "") => TextInput::Command(UiCommand::Start),
        ("stop", "") => TextInput::Command(UiCommand::Stop),
        ("status", "") => TextInput::ShowStatus,
        ("refresh", "") => TextInput::Command(UiCommand::Refresh),
        ("history", "") => TextInput::ShowHistory,
        ("help", "") | ("?", "") => TextInput::Help,
        ("quit", "") | ("exit", "") => TextInput::Command(UiCommand::Quit),
        ("model", "") => TextInput::Invalid("usage: model <name>".into()),
        ("model", name) => match name.parse::<ModelChoice>() {
            Ok(m) => TextInput::Command(UiCommand::SelectModel(m)),
            Err(e) => TextInput::Invalid(e),
        },
        _ => TextInput::Command(UiCommand::Send(line.to_string())),
    }
}

/// Tracks what has already been printed so repeated views only print changes.
#[derive(Debug, Default)]
pub(crate) struct TextPrinter {
    last: Option<SessionView>,
}

impl TextPrinter {
    pub fn apply(&mut self, ev: PanelEvent) -> Vec<OutputLine> {
        match ev {
            PanelEvent::Busy(msg) => vec![OutputLine::Stderr(format!("… {msg}"))],
            PanelEvent::Notice(msg) => vec![OutputLine::Stderr(msg)],
            PanelEvent::Warning(msg) => vec![OutputLine::Stderr(format!("warning: {msg}"))],
            PanelEvent::Error(msg) => vec![OutputLine::Stderr(format!("error: {msg}"))],
            PanelEvent::View(view) => self.apply_view(*view),
            PanelEvent::Closed => Vec::new(),
        }
    }

    fn apply_view(&mut self, view: SessionView) -> Vec<OutputLine> {
        let mut out = Vec::new();
        let (prev_status, prev_model, prev_len) = match &self.last {
            Some(v) => (Some(v.status), v.active_model.clone(), v.history.len()),
            None => (None, None, 0),
        };
        if prev_status != Some(view.status) || prev_model != view.active_model {
            out.push(OutputLine::Stderr(status_line(&view)));
        }
        // History is newest-first; print the new exchanges oldest to newest.
        let new = view.history.len().saturating_sub(prev_len);
        for ex in view.history[..new].iter().rev() {
            out.push(OutputLine::Stdout(format!("AI: {}", ex.answer)));
            out.push(OutputLine::Stdout(format!("You: {}", ex.prompt)));
            out.push(OutputLine::Stdout(String::new()));
        }
        self.last = Some(view);
        out
    }

    pub fn status_lines(&self) -> Vec<OutputLine> {
        match &self.last {
            Some(v) => vec![OutputLine::Stdout(status_line(v))],
            None => vec![OutputLine::Stderr("Status not available yet".into())],
        }
    }

    pub fn history_lines(&self) -> Vec<OutputLine> {
        let Some(v) = &self.last else {
            return Vec::new();
        };
        v.history
            .iter()
            .flat_map(|ex| ex.to_transcript().lines().map(str::to_string).collect::<Vec<_>>())
            .map(OutputLine::Stdout)
            .collect()
    }
}

fn status_line(view: &SessionView) -> String {
    let pid = view
        .pid
        .map(|p| format!(" (pid {p})"))
        .unwrap_or_default();
    format!(
        "Server Status: {}{} | Model: {} | Public URL: {}",
        view.status.label(),
        pid,
        view.active_model.as_deref().unwrap_or("-"),
        view.public_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Exchange, ServerStatus};

    fn text(lines: &[OutputLine]) -> Vec<String> {
        lines
            .iter()
            .map(|l| match l {
                OutputLine::Stdout(s) => format!("out:{s}"),
                OutputLine::Stderr(s) => format!("err:{s}"),
            })
            .collect()
    }

    fn view(status: ServerStatus, history: Vec<Exchange>) -> SessionView {
        SessionView {
            status,
            pid: None,
            public_url: "https://t.example".into(),
            active_model: Some("yi".into()),
            history,
            clear_input: false,
        }
    }

    #[test]
    fn parses_commands_and_prompts() {
        assert_eq!(parse_line("start"), TextInput::Command(UiCommand::Start));
        assert_eq!(parse_line(" STOP "), TextInput::Command(UiCommand::Stop));
        assert_eq!(
            parse_line("model mistral"),
            TextInput::Command(UiCommand::SelectModel(ModelChoice::Mistral))
        );
        assert_eq!(parse_line("refresh"), TextInput::Command(UiCommand::Refresh));
        assert!(matches!(parse_line("model nope"), TextInput::Invalid(_)));
        assert_eq!(parse_line(""), TextInput::Empty);
        assert_eq!(
            parse_line("What is 2+2?"),
            TextInput::Command(UiCommand::Send("What is 2+2?".into()))
        );
        // A command word followed by text is a prompt.
        assert_eq!(
            parse_line("start the story"),
            TextInput::Command(UiCommand::Send("start the story".into()))
        );
    }

    #[test]
    fn prints_status_only_on_change() {
        let mut p = TextPrinter::default();
        let first = p.apply(PanelEvent::View(Box::new(view(ServerStatus::Stopped, vec![]))));
        assert_eq!(text(&first).len(), 1);
        assert!(text(&first)[0].contains("Stopped"));

        let same = p.apply(PanelEvent::View(Box::new(view(ServerStatus::Stopped, vec![]))));
        assert!(same.is_empty());

        let up = p.apply(PanelEvent::View(Box::new(view(ServerStatus::Running, vec![]))));
        assert!(text(&up)[0].contains("Running"));
    }

    #[test]
    fn prints_only_new_exchanges() {
        let mut p = TextPrinter::default();
        let one = vec![Exchange::new("q1", "a1")];
        p.apply(PanelEvent::View(Box::new(view(ServerStatus::Running, one.clone()))));

        let mut two = one;
        two.insert(0, Exchange::new("q2", "a2"));
        let out = p.apply(PanelEvent::View(Box::new(view(ServerStatus::Running, two))));
        assert_eq!(text(&out), vec!["out:AI: a2", "out:You: q2", "out:"]);
    }
}
