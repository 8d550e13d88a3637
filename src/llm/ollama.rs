//! Ollama model client for local inference

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::{
    config_f32, config_model, config_stop, config_u32, CallConfig, LLMError, Message, ModelClient,
};

/// Configuration for the Ollama client
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama server URL (default: http://localhost:11434)
    pub host: String,
    /// Default model to use (default: phi4)
    pub default_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            default_model: "phi4".to_string(),
        }
    }
}

/// Request structure for Ollama chat completions
#[derive(Debug, Serialize)]
pub struct OllamaChatRequest<'a> {
    pub model: String,
    pub messages: &'a [Message],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

/// Options for Ollama generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl OllamaOptions {
    /// Picks the keys Ollama understands out of a call configuration.
    pub fn from_config(config: &CallConfig) -> Option<Self> {
        let options = Self {
            temperature: config_f32(config, "temperature"),
            top_p: config_f32(config, "top_p"),
            top_k: config_u32(config, "top_k"),
            num_predict: config_u32(config, "max_tokens"),
            stop: config_stop(config),
        };
        let empty = options.temperature.is_none()
            && options.top_p.is_none()
            && options.top_k.is_none()
            && options.num_predict.is_none()
            && options.stop.is_none();
        (!empty).then_some(options)
    }
}

/// Response from Ollama's chat endpoint
#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub message: Message,
    pub done: bool,
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub prompt_eval_count: u32,
    #[serde(default)]
    pub eval_count: u32,
}

/// A [`ModelClient`] talking to an Ollama server.
///
/// Ollama returns one completion per request, so an `n` greater than one is
/// served by issuing that many requests in sequence.
#[derive(Clone)]
pub struct Ollama {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl Ollama {
    /// Ollama on the default host with the default model (phi4)
    pub fn new() -> Self {
        Self::with_config(OllamaConfig::default())
    }

    pub fn with_config(config: OllamaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Ollama at a custom host URL
    pub fn at(host: impl Into<String>) -> Self {
        Self::with_config(OllamaConfig {
            host: host.into(),
            ..Default::default()
        })
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    async fn chat(
        &self,
        messages: &[Message],
        config: &CallConfig,
    ) -> Result<OllamaChatResponse, LLMError> {
        let request = OllamaChatRequest {
            model: self.model_for(config),
            messages,
            stream: false,
            options: OllamaOptions::from_config(config),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.config.host))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::OllamaError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let chat_response: OllamaChatResponse = response.json().await?;
        Ok(chat_response)
    }
}

impl Default for Ollama {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for Ollama {
    fn name(&self) -> &str {
        &self.config.default_model
    }

    fn model_for(&self, config: &CallConfig) -> String {
        config_model(config, &self.config.default_model)
    }

    async fn complete(
        &self,
        messages: &[Message],
        config: &CallConfig,
    ) -> Result<Vec<String>, LLMError> {
        let n = config_u32(config, "n").unwrap_or(1).max(1);
        let mut candidates = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let response = self.chat(messages, config).await?;
            log::debug!(
                "Ollama '{}' answered ({} prompt tokens, {} completion tokens)",
                response.model,
                response.prompt_eval_count,
                response.eval_count
            );
            candidates.push(response.message.content);
        }
        Ok(candidates)
    }
}
