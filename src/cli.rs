use crate::model::{ModelChoice, PanelConfig, PanelEvent, ServerStatus, StatusReport};
use crate::orchestrator::{self, UiCommand};
use crate::server::HealthProber;
use crate::session::Session;
use crate::text_mode::{self, TextInput, TextPrinter};
use crate::tunnel::NgrokTunnel;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// A line of user-facing output: answers and reports on stdout, notices on stderr.
#[derive(Debug)]
pub(crate) enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    /// Write the line, holding the stream lock for this line only. The log writer shares
    /// stderr and must be able to interleave.
    fn emit(&self) -> std::io::Result<()> {
        match self {
            OutputLine::Stdout(msg) => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{msg}")?;
                out.flush()
            }
            OutputLine::Stderr(msg) => writeln!(std::io::stderr().lock(), "{msg}"),
        }
    }
}

/// Terminal output runs on a blocking task so async tasks never wait on the terminal.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        while let Some(line) = rx.blocking_recv() {
            // A closed pipe drops the line; the channel keeps draining.
            let _ = line.emit();
        }
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "ollama-panel",
    version,
    about = "Control panel for a local Ollama server: start/stop, tunnel, model switching and chat"
)]
pub struct Cli {
    /// Base URL of the local inference server
    #[arg(long, default_value = "http://localhost:11434")]
    pub base_url: String,

    /// Inference server executable (run as `<binary> serve` / `<binary> stop <model>`)
    #[arg(long, default_value = "ollama")]
    pub binary: String,

    /// Tunnel agent executable
    #[arg(long, default_value = "ngrok")]
    pub ngrok_binary: String,

    /// Local port exposed through the tunnel
    #[arg(long, default_value_t = 11434)]
    pub tunnel_port: u16,

    /// Environment variable holding the tunnel auth token
    #[arg(long, default_value = "ngrok_auth_key")]
    pub token_env: String,

    /// Model selected when the panel opens (Yi, Mistral, Llama3.2, Tinyllama)
    #[arg(long, default_value = "yi")]
    pub model: ModelChoice,

    /// Health probe timeout in milliseconds
    #[arg(long, default_value_t = 800)]
    pub probe_timeout_ms: u64,

    /// Completion request timeout
    #[arg(long, default_value = "300s")]
    pub request_timeout: humantime::Duration,

    /// How long to wait for the tunnel agent to report its URL
    #[arg(long, default_value = "15s")]
    pub tunnel_timeout: humantime::Duration,

    /// Status refresh interval while idle
    #[arg(long, default_value = "2s")]
    pub status_interval: humantime::Duration,

    /// Line-oriented text mode on stdin/stdout (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Print server status as JSON and exit (no tunnel, no session)
    #[arg(long)]
    pub json: bool,

    /// Directory for the TUI log file
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,
}

impl Cli {
    /// Whether logs may go to stderr (the TUI owns the terminal otherwise).
    pub fn logs_to_stderr(&self) -> bool {
        self.text || self.json || !cfg!(feature = "tui")
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow::anyhow!("--json and --text cannot be combined"));
    }

    if args.json {
        return run_json(args).await;
    }

    if !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    run_text(args).await
}

/// Build a `PanelConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> PanelConfig {
    PanelConfig {
        base_url: args.base_url.trim_end_matches('/').to_string(),
        binary: args.binary.clone(),
        ngrok_binary: args.ngrok_binary.clone(),
        tunnel_port: args.tunnel_port,
        token_env: args.token_env.clone(),
        probe_timeout_ms: args.probe_timeout_ms,
        request_timeout: Duration::from(args.request_timeout),
        tunnel_timeout: Duration::from(args.tunnel_timeout),
        status_interval: Duration::from(args.status_interval),
        initial_model: args.model,
        user_agent: format!("ollama-panel/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Build the tunnel provider for a session.
pub fn tunnel_provider(cfg: &PanelConfig) -> NgrokTunnel {
    NgrokTunnel::new(cfg.ngrok_binary.clone(), cfg.token_env.clone(), cfg.tunnel_timeout)
}

/// Open the session for interactive modes. Tunnel failure aborts startup.
pub async fn open_session(args: &Cli) -> Result<Session> {
    let cfg = build_config(args);
    tracing::debug!(config = %serde_json::to_string(&cfg).unwrap_or_default(), "opening session");
    let provider = tunnel_provider(&cfg);
    Session::open(cfg, &provider)
        .await
        .context("session initialisation failed")
}

async fn run_json(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let prober = HealthProber::new(&cfg)?;
    let running = prober.probe().await;
    let report = StatusReport {
        base_url: cfg.base_url.clone(),
        status: ServerStatus::from_probe(running),
        running,
        models: ModelChoice::ALL.iter().map(|m| m.tag()).collect(),
    };
    let (out_tx, out_handle) = spawn_output_writer();
    let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&report)?));
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

async fn run_text(args: Cli) -> Result<()> {
    let session = open_session(&args).await?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PanelEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let _ = out_tx.send(OutputLine::Stderr(format!(
        "Public URL: {}",
        session.public_endpoint().url()
    )));
    let _ = out_tx.send(OutputLine::Stderr(text_mode::HELP.into()));

    let controller = tokio::spawn(orchestrator::run_controller(session, event_tx, cmd_rx));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut printer = TextPrinter::default();

    loop {
        tokio::select! {
            line = stdin.next_line(), if stdin_open => {
                let line = line.context("read stdin")?;
                let Some(line) = line else {
                    stdin_open = false;
                    let _ = cmd_tx.send(UiCommand::Quit);
                    continue;
                };
                match text_mode::parse_line(&line) {
                    TextInput::Command(UiCommand::Quit) => {
                        stdin_open = false;
                        let _ = cmd_tx.send(UiCommand::Quit);
                    }
                    TextInput::Command(cmd) => {
                        let _ = cmd_tx.send(cmd);
                    }
                    TextInput::ShowStatus => {
                        for l in printer.status_lines() {
                            let _ = out_tx.send(l);
                        }
                    }
                    TextInput::ShowHistory => {
                        for l in printer.history_lines() {
                            let _ = out_tx.send(l);
                        }
                    }
                    TextInput::Help => {
                        let _ = out_tx.send(OutputLine::Stderr(text_mode::HELP.into()));
                    }
                    TextInput::Invalid(msg) => {
                        let _ = out_tx.send(OutputLine::Stderr(format!("error: {msg}")));
                    }
                    TextInput::Empty => {}
                }
            }
            _ = tokio::signal::ctrl_c(), if stdin_open => {
                stdin_open = false;
                let _ = cmd_tx.send(UiCommand::Quit);
            }
            ev = event_rx.recv() => {
                match ev {
                    None | Some(PanelEvent::Closed) => break,
                    Some(ev) => {
                        for l in printer.apply(ev) {
                            let _ = out_tx.send(l);
                        }
                    }
                }
            }
        }
    }

    controller.await.context("controller task failed")??;
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
