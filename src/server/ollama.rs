use crate::error::PanelError;
use crate::model::PanelConfig;
use serde::{Deserialize, Serialize};

/// Fixed low temperature every handle is constructed with.
pub const MODEL_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Handle for one loaded model: name, sampling settings and the HTTP client used to reach it.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    name: String,
    temperature: f32,
    http: reqwest::Client,
    generate_url: String,
}

impl ModelHandle {
    pub fn new(cfg: &PanelConfig, name: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self {
            name: name.to_string(),
            temperature: MODEL_TEMPERATURE,
            http,
            generate_url: format!("{}/api/generate", cfg.base_url.trim_end_matches('/')),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Single non-streaming completion call.
    pub async fn invoke(&self, prompt: &str) -> Result<String, PanelError> {
        let req = GenerateRequest {
            model: &self.name,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };
        let resp = self.http.post(&self.generate_url).json(&req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(PanelError::InferenceCallFailed(format!(
                "HTTP {status}: {}",
                detail.trim()
            )));
        }
        let parsed: GenerateResponse = resp.json().await?;
        Ok(parsed.response.trim().to_string())
    }
}
