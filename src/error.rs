//! Error taxonomy for panel operations.
//!
//! Every session transition reports failures through [`PanelError`]. The controller renders
//! them inline; only tunnel failures during session startup are fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("`{binary}` command not found")]
    BinaryNotFound { binary: String },

    #[error("Start failed: {0}")]
    LaunchFailed(#[source] std::io::Error),

    #[error("Stop failed: {0}")]
    StopFailed(#[source] std::io::Error),

    #[error("Failed to stop model {model}: {reason}")]
    ModelUnloadFailed { model: String, reason: String },

    #[error("No active model selected")]
    NoActiveModel,

    #[error("Inference call failed: {0}")]
    InferenceCallFailed(String),

    #[error("Tunnel auth token missing: set the `{var}` environment variable")]
    TunnelAuthMissing { var: String },

    #[error("Tunnel provider unreachable: {0}")]
    TunnelUnreachable(String),
}

impl PanelError {
    /// Whether the error should be shown as a warning rather than a failure.
    pub fn is_warning(&self) -> bool {
        matches!(self, PanelError::ModelUnloadFailed { .. })
    }
}

impl From<reqwest::Error> for PanelError {
    fn from(e: reqwest::Error) -> Self {
        PanelError::InferenceCallFailed(e.to_string())
    }
}
