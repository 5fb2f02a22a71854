//! Session context and its transitions.
//!
//! A [`Session`] is built exactly once per interactive lifetime. All state that has to survive
//! between render cycles lives here as typed fields; the named transitions mutate it in place
//! and return a [`Render`] instruction for the presentation layer.

mod history;
mod switcher;

pub use history::ConversationHistory;
pub use switcher::{Activation, ModelSwitcher};

use crate::error::PanelError;
use crate::model::{Exchange, PanelConfig, Render, ServerStatus, SessionView};
use crate::server::{HealthProber, ProcessController, ServerProcess};
use crate::tunnel::{PublicEndpoint, Tunnel, TunnelProvider};
use anyhow::{Context, Result};

/// Prompt template applied to every user message.
pub fn instruction_for(prompt: &str) -> String {
    format!("Answer concisely: {prompt}")
}

pub struct Session {
    cfg: PanelConfig,
    controller: ProcessController,
    prober: HealthProber,
    switcher: ModelSwitcher,
    history: ConversationHistory,
    server: Option<ServerProcess>,
    tunnel: Tunnel,
    pending_input_clear: bool,
}

impl Session {
    /// Initialise the session. Provisions the public tunnel; failure aborts startup.
    pub async fn open(cfg: PanelConfig, tunnel: &dyn TunnelProvider) -> Result<Self> {
        let prober = HealthProber::new(&cfg)?;
        let tunnel = tunnel
            .open(cfg.tunnel_port)
            .await
            .context("provision public tunnel")?;
        Ok(Self {
            controller: ProcessController::new(cfg.binary.clone()),
            prober,
            switcher: ModelSwitcher::default(),
            history: ConversationHistory::default(),
            server: None,
            tunnel,
            pending_input_clear: false,
            cfg,
        })
    }

    pub fn config(&self) -> &PanelConfig {
        &self.cfg
    }

    pub fn public_endpoint(&self) -> &PublicEndpoint {
        self.tunnel.endpoint()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn active_model(&self) -> Option<&str> {
        self.switcher.active_name()
    }

    pub fn server_pid(&self) -> Option<u32> {
        self.server.as_ref().map(ServerProcess::pid)
    }

    /// Start the server unless one is already tracked.
    pub fn start(&mut self) -> Result<Render, PanelError> {
        if let Some(server) = &self.server {
            return Ok(Render::Notice(format!(
                "Server already started (pid {})",
                server.pid()
            )));
        }
        let server = self.controller.start()?;
        let notice = format!("Started `{} serve` (pid {})", self.controller.binary(), server.pid());
        self.server = Some(server);
        Ok(Render::Notice(notice))
    }

    pub async fn stop(&mut self) -> Result<Render, PanelError> {
        if self.server.is_none() {
            return Ok(Render::Notice("No server process to stop".into()));
        }
        self.controller.stop(&mut self.server).await?;
        Ok(Render::Notice("Server stopped".into()))
    }

    /// Make `model_name` the active model. Unload failures come back as warnings.
    pub async fn switch_model(&mut self, model_name: &str) -> Activation {
        self.switcher
            .activate(&self.cfg, model_name, &self.controller)
            .await
    }

    /// Relay a prompt to the active model and prepend the exchange on success.
    pub async fn send(&mut self, prompt: &str) -> Result<Render, PanelError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Ok(Render::Refresh);
        }
        let handle = self.switcher.active().ok_or(PanelError::NoActiveModel)?;
        let answer = handle.invoke(&instruction_for(prompt)).await?;
        tracing::info!(
            model = handle.name(),
            temperature = handle.temperature(),
            chars = answer.len(),
            "completion received"
        );
        self.history.prepend(Exchange::new(prompt, answer));
        self.pending_input_clear = true;
        Ok(Render::ClearInput)
    }

    /// One render cycle: reap a server that exited on its own, probe health, and hand out a
    /// snapshot. Consumes the pending input-clear flag.
    pub async fn render(&mut self) -> SessionView {
        if let Some(server) = self.server.as_mut() {
            if server.has_exited() {
                tracing::warn!(pid = server.pid(), "server process exited on its own");
                self.server = None;
            }
        }
        let status = self.display_status().await;
        SessionView {
            status,
            pid: self.server_pid(),
            public_url: self.public_endpoint().url().to_string(),
            active_model: self.active_model().map(str::to_string),
            history: self.history().as_slice().to_vec(),
            clear_input: std::mem::take(&mut self.pending_input_clear),
        }
    }

    /// Fresh probe on every call; nothing is cached.
    pub async fn display_status(&self) -> ServerStatus {
        ServerStatus::from_probe(self.prober.probe().await)
    }

    /// End of session: close the tunnel and stop a server we still track.
    pub async fn shutdown(&mut self) {
        let Self {
            controller,
            server,
            tunnel,
            ..
        } = self;
        let stop_server = async {
            if server.is_some() {
                if let Err(e) = controller.stop(server).await {
                    tracing::warn!(error = %e, "failed to stop server during shutdown");
                }
            }
        };
        futures::join!(stop_server, tunnel.close());
    }
}
