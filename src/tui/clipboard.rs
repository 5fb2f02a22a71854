use anyhow::{anyhow, Result};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::OnceLock;
use std::time::Duration;

// Some clipboard managers only read the selection while its owner is alive.
const HOLD_SELECTION: Duration = Duration::from_secs(2);

static WORKER: OnceLock<SyncSender<String>> = OnceLock::new();

fn worker() -> &'static SyncSender<String> {
    WORKER.get_or_init(|| {
        let (tx, rx) = sync_channel::<String>(1);
        std::thread::spawn(move || {
            for url in rx {
                match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(url).map(|()| cb)) {
                    Ok(_owner) => std::thread::sleep(HOLD_SELECTION),
                    Err(e) => tracing::warn!(error = %e, "clipboard unavailable"),
                }
            }
        });
        tx
    })
}

/// Hand `text` to the clipboard thread. Never blocks the UI loop.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    match worker().try_send(text.to_string()) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => Err(anyhow!("a copy is already in progress")),
        Err(TrySendError::Disconnected(_)) => Err(anyhow!("clipboard thread stopped")),
    }
}
