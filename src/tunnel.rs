//! Public tunnel provisioning.
//!
//! The tunnel is opened once when a session starts and lives exactly as long as the session.
//! The ngrok agent is launched as a child process and its JSON log is read until it reports
//! the public URL.

use crate::error::PanelError;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

/// Externally reachable URL for the session. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicEndpoint {
    url: String,
}

impl PublicEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// An open tunnel. Dropping it tears down the agent process, if any.
#[derive(Debug)]
pub struct Tunnel {
    endpoint: PublicEndpoint,
    agent: Option<Child>,
}

impl Tunnel {
    /// A tunnel with no agent process behind it.
    #[cfg(test)]
    pub fn detached(endpoint: PublicEndpoint) -> Self {
        Self {
            endpoint,
            agent: None,
        }
    }

    pub fn endpoint(&self) -> &PublicEndpoint {
        &self.endpoint
    }

    pub async fn close(&mut self) {
        if let Some(mut agent) = self.agent.take() {
            let _ = agent.start_kill();
            let _ = agent.wait().await;
            tracing::info!(url = %self.endpoint.url, "tunnel closed");
        }
    }
}

#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// Bind `port` to a public URL. Called at most once per session.
    async fn open(&self, port: u16) -> Result<Tunnel, PanelError>;
}

/// Tunnel provider backed by the `ngrok` agent binary.
#[derive(Debug, Clone)]
pub struct NgrokTunnel {
    binary: String,
    token_env: String,
    timeout: Duration,
}

impl NgrokTunnel {
    pub fn new(binary: impl Into<String>, token_env: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            token_env: token_env.into(),
            timeout,
        }
    }

    fn auth_token(&self) -> Result<String, PanelError> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| PanelError::TunnelAuthMissing {
                var: self.token_env.clone(),
            })
    }
}

#[async_trait]
impl TunnelProvider for NgrokTunnel {
    async fn open(&self, port: u16) -> Result<Tunnel, PanelError> {
        let token = self.auth_token()?;

        let mut agent = Command::new(&self.binary)
            .arg("http")
            .arg(port.to_string())
            .arg("--authtoken")
            .arg(&token)
            .args(["--log", "stdout", "--log-format", "json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PanelError::TunnelUnreachable(format!("cannot launch `{}`: {e}", self.binary))
            })?;

        let stdout = agent
            .stdout
            .take()
            .ok_or_else(|| PanelError::TunnelUnreachable("agent stdout unavailable".into()))?;
        let mut lines = BufReader::new(stdout).lines();

        let url = match tokio::time::timeout(self.timeout, wait_for_url(&mut lines)).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(PanelError::TunnelUnreachable(format!(
                    "no tunnel URL within {}",
                    humantime::format_duration(self.timeout)
                )))
            }
        };

        // Keep draining the log so the agent never blocks on a full pipe.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(target: "ollama_panel::tunnel_output", "{line}");
            }
        });

        tracing::info!(port, url = %url, "tunnel opened");
        Ok(Tunnel {
            endpoint: PublicEndpoint::new(url),
            agent: Some(agent),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AgentLogLine {
    #[serde(default)]
    lvl: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    err: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum LogOutcome {
    Url(String),
    Failed(String),
    Pending,
}

fn classify_log_line(line: &str) -> LogOutcome {
    let Ok(rec) = serde_json::from_str::<AgentLogLine>(line) else {
        return LogOutcome::Pending;
    };
    if rec.msg == "started tunnel" {
        if let Some(url) = rec.url.filter(|u| !u.is_empty()) {
            return LogOutcome::Url(url);
        }
    }
    if matches!(rec.lvl.as_str(), "eror" | "crit") {
        return LogOutcome::Failed(rec.err.unwrap_or(rec.msg));
    }
    LogOutcome::Pending
}

async fn wait_for_url(lines: &mut Lines<BufReader<ChildStdout>>) -> Result<String, PanelError> {
    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| PanelError::TunnelUnreachable(format!("reading agent log: {e}")))?;
        let Some(line) = line else {
            return Err(PanelError::TunnelUnreachable(
                "agent exited before reporting a tunnel URL".into(),
            ));
        };
        match classify_log_line(&line) {
            LogOutcome::Url(url) => return Ok(url),
            LogOutcome::Failed(reason) => return Err(PanelError::TunnelUnreachable(reason)),
            LogOutcome::Pending => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_tunnel_line_yields_url() {
        let line = r#"{"addr":"http://localhost:11434","lvl":"info","msg":"started tunnel","name":"command_line","obj":"tunnels","url":"https://abc.ngrok-free.app"}"#;
        assert_eq!(
            classify_log_line(line),
            LogOutcome::Url("https://abc.ngrok-free.app".into())
        );
    }

    #[test]
    fn error_line_fails_with_agent_reason() {
        let line = r#"{"lvl":"eror","msg":"session closing","err":"authentication failed"}"#;
        assert_eq!(
            classify_log_line(line),
            LogOutcome::Failed("authentication failed".into())
        );
    }

    #[test]
    fn unrelated_and_garbage_lines_are_pending() {
        assert_eq!(
            classify_log_line(r#"{"lvl":"info","msg":"client session established"}"#),
            LogOutcome::Pending
        );
        assert_eq!(classify_log_line("not json"), LogOutcome::Pending);
    }

    #[tokio::test]
    async fn missing_token_is_reported_before_launch() {
        let provider = NgrokTunnel::new(
            "ngrok-binary-that-is-never-run",
            "OLLAMA_PANEL_TEST_TOKEN_UNSET",
            Duration::from_secs(1),
        );
        match provider.open(11434).await {
            Err(PanelError::TunnelAuthMissing { var }) => {
                assert_eq!(var, "OLLAMA_PANEL_TEST_TOKEN_UNSET")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unlaunchable_agent_is_unreachable() {
        std::env::set_var("OLLAMA_PANEL_TEST_TOKEN_MISSING_BIN", "tok");
        let provider = NgrokTunnel::new(
            "ngrok-binary-that-does-not-exist",
            "OLLAMA_PANEL_TEST_TOKEN_MISSING_BIN",
            Duration::from_secs(1),
        );
        assert!(matches!(
            provider.open(11434).await,
            Err(PanelError::TunnelUnreachable(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fake_agent_reports_url() {
        use crate::testutil::FakeBinary;

        std::env::set_var("OLLAMA_PANEL_TEST_TOKEN_FAKE_AGENT", "tok");
        let agent = FakeBinary::from_script(
            r#"echo '{"lvl":"info","msg":"starting web service"}'
echo '{"lvl":"info","msg":"started tunnel","url":"https://fake.ngrok.app"}'
exec sleep 30"#,
        );
        let provider = NgrokTunnel::new(
            agent.path(),
            "OLLAMA_PANEL_TEST_TOKEN_FAKE_AGENT",
            Duration::from_secs(5),
        );
        let mut tunnel = provider.open(11434).await.unwrap();
        assert_eq!(tunnel.endpoint().url(), "https://fake.ngrok.app");
        tunnel.close().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn agent_exiting_early_is_unreachable() {
        use crate::testutil::FakeBinary;

        std::env::set_var("OLLAMA_PANEL_TEST_TOKEN_EARLY_EXIT", "tok");
        let agent = FakeBinary::from_script("echo '{\"lvl\":\"info\",\"msg\":\"bye\"}'\nexit 1");
        let provider = NgrokTunnel::new(
            agent.path(),
            "OLLAMA_PANEL_TEST_TOKEN_EARLY_EXIT",
            Duration::from_secs(5),
        );
        assert!(matches!(
            provider.open(11434).await,
            Err(PanelError::TunnelUnreachable(_))
        ));
    }
}
