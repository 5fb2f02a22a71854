//! Session controller.
//!
//! Owns the session, applies UI commands one at a time and emits events for presentation
//! layers. Every handled command is followed by exactly one render cycle.

use crate::error::PanelError;
use crate::model::{ModelChoice, PanelEvent, Render};
use crate::session::Session;
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;

/// Commands emitted by UI layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UiCommand {
    Start,
    Stop,
    SelectModel(ModelChoice),
    Send(String),
    Refresh,
    Quit,
}

/// Dispatch UI commands against the session until the UI quits or hangs up.
pub(crate) async fn run_controller(
    mut session: Session,
    event_tx: UnboundedSender<PanelEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    // The selector starts on the configured model, which activates it like any other pick.
    let initial = session.config().initial_model;
    apply_command(&mut session, UiCommand::SelectModel(initial), &event_tx).await;
    emit_view(&mut session, &event_tx).await;

    let period = session.config().status_interval;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Quit) | None => break,
                    Some(cmd) => {
                        apply_command(&mut session, cmd, &event_tx).await;
                        emit_view(&mut session, &event_tx).await;
                        ticker.reset();
                    }
                }
            }
            _ = ticker.tick() => {
                emit_view(&mut session, &event_tx).await;
            }
        }
    }

    session.shutdown().await;
    let _ = event_tx.send(PanelEvent::Closed);
    Ok(())
}

/// Apply one named transition and report its outcome.
pub(crate) async fn apply_command(
    session: &mut Session,
    cmd: UiCommand,
    event_tx: &UnboundedSender<PanelEvent>,
) {
    match cmd {
        UiCommand::Start => {
            tracing::info!("start requested");
            report(event_tx, session.start());
        }
        UiCommand::Stop => {
            tracing::info!("stop requested");
            let _ = event_tx.send(PanelEvent::Busy("Stopping server…".into()));
            report(event_tx, session.stop().await);
        }
        UiCommand::SelectModel(choice) => {
            let outcome = session.switch_model(choice.tag()).await;
            if let Some(w) = outcome.unload_warning {
                let _ = event_tx.send(PanelEvent::Warning(w.to_string()));
            }
            if let Some(e) = outcome.construct_error {
                let _ = event_tx.send(PanelEvent::Error(format!("Model {choice} unavailable: {e}")));
            } else if !outcome.unchanged {
                let _ = event_tx.send(PanelEvent::Notice(format!("Model: {choice}")));
            }
        }
        UiCommand::Send(prompt) => {
            tracing::debug!(chars = prompt.len(), "prompt submitted");
            let _ = event_tx.send(PanelEvent::Busy("Thinking…".into()));
            report(event_tx, session.send(&prompt).await);
        }
        UiCommand::Refresh | UiCommand::Quit => {}
    }
}

pub(crate) async fn emit_view(session: &mut Session, event_tx: &UnboundedSender<PanelEvent>) {
    let view = session.render().await;
    let _ = event_tx.send(PanelEvent::View(Box::new(view)));
}

fn report(event_tx: &UnboundedSender<PanelEvent>, res: Result<Render, PanelError>) {
    let ev = match res {
        Ok(Render::Notice(msg)) => PanelEvent::Notice(msg),
        Ok(Render::Refresh) | Ok(Render::ClearInput) => return,
        Err(e) if e.is_warning() => PanelEvent::Warning(e.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "command failed");
            PanelEvent::Error(e.to_string())
        }
    };
    let _ = event_tx.send(ev);
}
