use crate::model::PanelConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;

/// Point-in-time reachability check against the server's local endpoint.
#[derive(Debug, Clone)]
pub struct HealthProber {
    http: reqwest::Client,
    url: String,
}

impl HealthProber {
    pub fn new(cfg: &PanelConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_millis(cfg.probe_timeout_ms))
            .build()
            .context("build health probe client")?;
        Ok(Self {
            http,
            url: format!("{}/", cfg.base_url.trim_end_matches('/')),
        })
    }

    /// Returns true only for an HTTP 200 answer. Any failure reads as "not running".
    pub async fn probe(&self) -> bool {
        match self.http.get(&self.url).send().await {
            Ok(resp) => {
                let ok = resp.status() == StatusCode::OK;
                tracing::debug!(url = %self.url, status = %resp.status(), "health probe");
                ok
            }
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "health probe failed");
                false
            }
        }
    }
}
