use crate::error::PanelError;
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// A running `<binary> serve` child.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    pid: u32,
}

impl ServerProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Non-blocking check; reaps the child if it exited on its own.
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }
}

/// The model-stop primitive the model switcher depends on.
#[async_trait]
pub trait ModelUnloader: Send + Sync {
    async fn unload(&self, model: &str) -> Result<(), PanelError>;
}

/// Starts and terminates the inference-server process.
///
/// Performs no duplicate detection: callers check whether a process is already tracked.
#[derive(Debug, Clone)]
pub struct ProcessController {
    binary: String,
}

impl ProcessController {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Spawn `<binary> serve`. Output is forwarded to the log, never to the terminal.
    pub fn start(&self) -> Result<ServerProcess, PanelError> {
        let mut child = Command::new(&self.binary)
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let pid = child.id().unwrap_or_default();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "ollama_panel::server_output", "{line}");
                }
            });
        }
        tracing::info!(binary = %self.binary, pid, "server process started");
        Ok(ServerProcess { child, pid })
    }

    /// Terminate the tracked process and wait for it to exit, clearing the slot on success.
    ///
    /// On failure the handle is kept only if the child is still alive, so a later stop can
    /// retry; a child that is already gone is cleared either way.
    pub async fn stop(&self, slot: &mut Option<ServerProcess>) -> Result<(), PanelError> {
        let Some(server) = slot.as_mut() else {
            return Ok(());
        };
        let pid = server.pid;
        let res = match terminate(&mut server.child) {
            Ok(()) => server.child.wait().await.map(|_| ()),
            Err(e) => Err(e),
        };
        match res {
            Ok(()) => {
                tracing::info!(pid, "server process stopped");
                *slot = None;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(pid, error = %e, "stop failed");
                release_if_gone(slot);
                Err(PanelError::StopFailed(e))
            }
        }
    }

    fn spawn_error(&self, e: io::Error) -> PanelError {
        if e.kind() == io::ErrorKind::NotFound {
            PanelError::BinaryNotFound {
                binary: self.binary.clone(),
            }
        } else {
            PanelError::LaunchFailed(e)
        }
    }
}

#[async_trait]
impl ModelUnloader for ProcessController {
    /// Run `<binary> stop <model>`; any non-zero exit is a failure.
    async fn unload(&self, model: &str) -> Result<(), PanelError> {
        let out = Command::new(&self.binary)
            .arg("stop")
            .arg(model)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PanelError::ModelUnloadFailed {
                model: model.to_string(),
                reason: e.to_string(),
            })?;
        if out.status.success() {
            tracing::info!(model, "model unloaded");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        let reason = match stderr.trim() {
            "" => out.status.to_string(),
            msg => format!("{}: {msg}", out.status),
        };
        Err(PanelError::ModelUnloadFailed {
            model: model.to_string(),
            reason,
        })
    }
}

/// After a failed stop: clear the handle if the child is gone, keep it while it still runs.
/// Returns whether the handle is still tracked.
fn release_if_gone(slot: &mut Option<ServerProcess>) -> bool {
    let Some(server) = slot.as_mut() else {
        return false;
    };
    if server.has_exited() {
        tracing::info!(pid = server.pid, "process already gone; clearing handle");
        *slot = None;
        false
    } else {
        true
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> io::Result<()> {
    // id() is None once the child has been reaped.
    let Some(pid) = child.id() else {
        return Ok(());
    };
    // SAFETY: kill(2) with a pid we own and a valid signal number has no memory effects.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testutil::FakeBinary;

    #[tokio::test]
    async fn start_reports_missing_binary() {
        let ctl = ProcessController::new("definitely-not-a-real-ollama-binary");
        match ctl.start() {
            Err(PanelError::BinaryNotFound { binary }) => {
                assert_eq!(binary, "definitely-not-a-real-ollama-binary")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_then_stop_clears_handle() {
        let fake = FakeBinary::new(0);
        let ctl = ProcessController::new(fake.path());

        let mut slot = Some(ctl.start().unwrap());
        assert!(slot.as_ref().unwrap().pid() > 0);
        assert!(!slot.as_mut().unwrap().has_exited());

        ctl.stop(&mut slot).await.unwrap();
        assert!(slot.is_none());
    }

    fn spawn_tracked(program: &str, args: &[&str]) -> ServerProcess {
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        ServerProcess { child, pid }
    }

    #[tokio::test]
    async fn failed_stop_keeps_live_child() {
        let mut slot = Some(spawn_tracked("sleep", &["30"]));
        assert!(release_if_gone(&mut slot));
        assert!(slot.is_some());
    }

    #[tokio::test]
    async fn failed_stop_clears_exited_child() {
        let mut server = spawn_tracked("true", &[]);
        server.child.wait().await.unwrap();
        let mut slot = Some(server);
        assert!(!release_if_gone(&mut slot));
        assert!(slot.is_none());
    }

    #[tokio::test]
    async fn stop_without_process_is_noop() {
        let ctl = ProcessController::new("ollama");
        let mut slot = None;
        ctl.stop(&mut slot).await.unwrap();
        assert!(slot.is_none());
    }

    #[tokio::test]
    async fn unload_runs_stop_subcommand() {
        let fake = FakeBinary::new(0);
        let ctl = ProcessController::new(fake.path());
        ctl.unload("mistral").await.unwrap();
        assert_eq!(fake.unloaded(), vec!["mistral".to_string()]);
    }

    #[tokio::test]
    async fn unload_failure_carries_exit_status() {
        let fake = FakeBinary::new(3);
        let ctl = ProcessController::new(fake.path());
        match ctl.unload("yi").await {
            Err(PanelError::ModelUnloadFailed { model, reason }) => {
                assert_eq!(model, "yi");
                assert!(reason.contains('3'), "reason was {reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
