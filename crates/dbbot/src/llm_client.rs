//! Text-generation client.
//!
//! The repair loop depends only on [`LlmClient`]; the Cohere chat backend is the
//! production implementation. A client never retries on its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{ConfigurationError, GenerationError};

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends one prompt and returns the model's raw text.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    fn name(&self) -> &str;
}

/// Configured-or-not LLM state, decided once at startup.
pub type LlmHandle = Result<Arc<dyn LlmClient>, ConfigurationError>;

/// Builds the LLM client from configuration, or the configuration error that disables generation.
pub fn build_llm_client(cfg: &Config) -> LlmHandle {
    match CohereClient::from_config(cfg) {
        Ok(client) => {
            info!("LLM client configured: {} at {}", client.name(), client.base_url);
            Ok(Arc::new(client))
        }
        Err(e) => {
            error!("Error configuring LLM client: {}", e);
            Err(e)
        }
    }
}

#[derive(Debug, Serialize)]
struct CohereChatRequest<'a> {
    message: &'a str,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CohereChatResponse {
    text: String,
}

pub struct CohereClient {
    api_key: String,
    base_url: String,
    model: Option<String>,
    temperature: f32,
    http_client: reqwest::Client,
}

impl CohereClient {
    pub fn new(
        api_key: String,
        base_url: String,
        model: Option<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, ConfigurationError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigurationError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
            http_client,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ConfigurationError> {
        let api_key = cfg
            .cohere_api_key
            .clone()
            .ok_or_else(|| ConfigurationError("COHERE_API_KEY not found in environment variables.".to_string()))?;
        Self::new(
            api_key,
            cfg.cohere_base_url.clone(),
            cfg.cohere_model.clone(),
            cfg.llm_temperature,
            cfg.llm_timeout(),
        )
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat", self.base_url)
    }
}

#[async_trait]
impl LlmClient for CohereClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        debug!("Sending prompt to Cohere ({} chars)", prompt.len());
        let request = CohereChatRequest {
            message: prompt,
            temperature: self.temperature,
            model: self.model.as_deref(),
        };
        let response = self
            .http_client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let completion: CohereChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;
        debug!("Cohere returned {} chars", completion.text.len());
        Ok(completion.text)
    }

    fn name(&self) -> &str {
        "cohere"
    }
}
