//! OpenAI-compatible chat completions client
//!
//! Defaults to DeepSeek, which exposes the OpenAI wire format; any other
//! compatible endpoint works by changing the base URL and model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::{
    config_f32, config_model, config_stop, config_u32, CallConfig, LLMError, Message, ModelClient,
};

/// Configuration for an OpenAI-compatible endpoint
#[derive(Clone, Debug)]
pub struct OpenAiCompatConfig {
    /// API key for authentication
    pub api_key: String,
    /// Base URL (default: https://api.deepseek.com)
    pub base_url: String,
    /// Default model to use (default: deepseek-chat)
    pub default_model: String,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.deepseek.com".to_string(),
            default_model: "deepseek-chat".to_string(),
        }
    }
}

/// Request structure for chat completions
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: String,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    pub stream: bool,
}

/// Response from chat completions
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    pub usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A [`ModelClient`] for any endpoint speaking the OpenAI chat format.
#[derive(Clone)]
pub struct OpenAiCompat {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompat {
    /// DeepSeek with the given API key and default base URL
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_config(OpenAiCompatConfig {
            api_key: api_key.into(),
            ..Default::default()
        })
    }

    pub fn with_config(config: OpenAiCompatConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    pub fn config(&self) -> &OpenAiCompatConfig {
        &self.config
    }

    /// Builds the request body for `messages` under `config`.
    pub fn request<'a>(&self, messages: &'a [Message], config: &CallConfig) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: self.model_for(config),
            messages,
            temperature: config_f32(config, "temperature"),
            max_tokens: config_u32(config, "max_tokens"),
            top_p: config_f32(config, "top_p"),
            n: config_u32(config, "n"),
            stop: config_stop(config),
            stream: false,
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiCompat {
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
        if self.config.api_key.is_empty() {
            return Err(LLMError::ProviderNotConfigured(
                "API key is empty".to_string(),
            ));
        }

        let request = self.request(messages, config);
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::OpenAiCompatError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        if let Some(usage) = &completion.usage {
            log::debug!(
                "'{}' answered {} ({} total tokens)",
                completion.model,
                completion.id,
                usage.total_tokens
            );
        }

        let mut choices = completion.choices;
        choices.sort_by_key(|c| c.index);
        if choices.is_empty() {
            return Err(LLMError::InvalidResponse("No choices in response".to_string()));
        }
        Ok(choices.into_iter().map(|c| c.message.content).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let client = OpenAiCompat::new("test-key");
        assert_eq!(client.config().api_key, "test-key");
        assert_eq!(client.config().base_url, "https://api.deepseek.com");
        assert_eq!(client.name(), "deepseek-chat");

        let custom = OpenAiCompat::new("k")
            .base_url("http://localhost:8000")
            .model("qwen");
        assert_eq!(custom.config().base_url, "http://localhost:8000");
        assert_eq!(custom.name(), "qwen");
    }

    #[test]
    fn test_request_serialization() {
        let client = OpenAiCompat::new("k");
        let messages = vec![Message::user("Test")];
        let mut config = CallConfig::new();
        config.insert("temperature".into(), json!(0.7));
        config.insert("n".into(), json!(3));
        config.insert("model".into(), json!("deepseek-reasoner"));

        let json = serde_json::to_value(client.request(&messages, &config)).unwrap();
        assert_eq!(json["model"], "deepseek-reasoner");
        assert_eq!(client.model_for(&config), "deepseek-reasoner");
        assert_eq!(json["n"], 3);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["temperature"].as_f64().unwrap() > 0.69);
        assert!(json.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected_before_sending() {
        let client = OpenAiCompat::new("");
        let result = client.complete(&[Message::user("hi")], &CallConfig::new()).await;
        assert!(matches!(result, Err(LLMError::ProviderNotConfigured(_))));
    }
}
