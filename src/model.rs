use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub base_url: String,
    pub binary: String,
    pub ngrok_binary: String,
    pub tunnel_port: u16,
    pub token_env: String,
    pub probe_timeout_ms: u64,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub tunnel_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub status_interval: Duration,
    pub initial_model: ModelChoice,
    pub user_agent: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            binary: "ollama".into(),
            ngrok_binary: "ngrok".into(),
            tunnel_port: 11434,
            token_env: "ngrok_auth_key".into(),
            probe_timeout_ms: 800,
            request_timeout: Duration::from_secs(300),
            tunnel_timeout: Duration::from_secs(15),
            status_interval: Duration::from_secs(2),
            initial_model: ModelChoice::Yi,
            user_agent: format!("ollama-panel/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Models offered by the selector. The server tag is the lower-cased label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelChoice {
    #[serde(rename = "yi")]
    Yi,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "llama3.2")]
    Llama32,
    #[serde(rename = "tinyllama")]
    Tinyllama,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 4] = [
        ModelChoice::Yi,
        ModelChoice::Mistral,
        ModelChoice::Llama32,
        ModelChoice::Tinyllama,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ModelChoice::Yi => "Yi",
            ModelChoice::Mistral => "Mistral",
            ModelChoice::Llama32 => "Llama3.2",
            ModelChoice::Tinyllama => "Tinyllama",
        }
    }

    /// Name the inference server knows the model by.
    pub fn tag(self) -> &'static str {
        match self {
            ModelChoice::Yi => "yi",
            ModelChoice::Mistral => "mistral",
            ModelChoice::Llama32 => "llama3.2",
            ModelChoice::Tinyllama => "tinyllama",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|m| *m == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ModelChoice::ALL
            .into_iter()
            .find(|m| m.tag() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = ModelChoice::ALL.iter().map(|m| m.label()).collect();
                format!("unknown model `{s}` (expected one of: {})", names.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Running,
    Stopped,
}

#[cfg(feature = "tui")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusColor {
    Green,
    Red,
}

impl ServerStatus {
    pub fn from_probe(running: bool) -> Self {
        if running {
            ServerStatus::Running
        } else {
            ServerStatus::Stopped
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ServerStatus::Running => "Running",
            ServerStatus::Stopped => "Stopped",
        }
    }

    #[cfg(feature = "tui")]
    pub fn color(self) -> StatusColor {
        match self {
            ServerStatus::Running => StatusColor::Green,
            ServerStatus::Stopped => StatusColor::Red,
        }
    }
}

/// One prompt/answer pair in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub at: String,
}

impl Exchange {
    pub fn new(prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        let fmt = time::macros::format_description!("[hour]:[minute]:[second]");
        let now = time::OffsetDateTime::now_local()
            .unwrap_or_else(|_| time::OffsetDateTime::now_utc());
        Self {
            prompt: prompt.into(),
            answer: answer.into(),
            at: now.format(fmt).unwrap_or_default(),
        }
    }

    /// Transcript form: answer first, then the prompt, then a blank separator.
    pub fn to_transcript(&self) -> String {
        format!("AI: {}\nYou: {}\n\n", self.answer, self.prompt)
    }
}

/// Snapshot of the session handed to presentation layers after each render cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub status: ServerStatus,
    pub pid: Option<u32>,
    pub public_url: String,
    pub active_model: Option<String>,
    pub history: Vec<Exchange>,
    /// Input must be presented empty on the next frame.
    pub clear_input: bool,
}

/// Instruction returned by a session transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Render {
    Refresh,
    /// Refresh and show an inline notice.
    Notice(String),
    /// Refresh; the input widget must come back empty.
    ClearInput,
}

/// Events emitted by the controller and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    Busy(String),
    Notice(String),
    Warning(String),
    Error(String),
    View(Box<SessionView>),
    Closed,
}

/// One-shot status report printed by `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub base_url: String,
    pub status: ServerStatus,
    pub running: bool,
    pub models: Vec<&'static str>,
}
