use crate::error::PanelError;
use crate::model::PanelConfig;
use crate::server::{ModelHandle, ModelUnloader};

/// Result of an activation request.
#[derive(Debug, Default)]
pub struct Activation {
    /// The requested model was already active; nothing happened.
    pub unchanged: bool,
    /// Unloading the previous model failed; the switch went ahead anyway.
    pub unload_warning: Option<PanelError>,
    /// Building the new handle failed; no model is active now.
    pub construct_error: Option<String>,
}

/// Keeps at most one model active, unloading the previous one before switching.
#[derive(Debug, Default)]
pub struct ModelSwitcher {
    active: Option<ModelHandle>,
}

impl ModelSwitcher {
    pub fn active(&self) -> Option<&ModelHandle> {
        self.active.as_ref()
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(ModelHandle::name)
    }

    pub async fn activate<U: ModelUnloader + ?Sized>(
        &mut self,
        cfg: &PanelConfig,
        model_name: &str,
        unloader: &U,
    ) -> Activation {
        if self.active_name() == Some(model_name) {
            return Activation {
                unchanged: true,
                ..Default::default()
            };
        }

        let mut outcome = Activation::default();
        // Stop-before-start: the previous handle is gone before the new one exists.
        if let Some(previous) = self.active.take() {
            if let Err(e) = unloader.unload(previous.name()).await {
                tracing::warn!(model = previous.name(), error = %e, "unload failed; continuing switch");
                outcome.unload_warning = Some(e);
            }
        }

        match ModelHandle::new(cfg, model_name) {
            Ok(handle) => {
                tracing::info!(model = model_name, temperature = handle.temperature(), "model active");
                self.active = Some(handle);
            }
            Err(e) => {
                tracing::warn!(model = model_name, error = %e, "model handle construction failed");
                outcome.construct_error = Some(e.to_string());
            }
        }
        outcome
    }
}
