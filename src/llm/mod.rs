//! Model client boundary for Sigil
//!
//! Everything the core needs from a language model provider lives behind the
//! [`ModelClient`] trait: an ordered message sequence and a configuration map go
//! in, one or more raw completion texts come out. Retries, authentication and
//! provider-specific translation belong to the implementations.
//!
//! Concrete HTTP providers are enabled with the `llm` feature.

pub mod dummy;
pub mod error;

#[cfg(feature = "llm")]
pub mod ollama;
#[cfg(feature = "llm")]
pub mod openai_compat;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use dummy::DummyLM;
pub use error::LLMError;

#[cfg(feature = "llm")]
pub use ollama::{Ollama, OllamaConfig};
#[cfg(feature = "llm")]
pub use openai_compat::{OpenAiCompat, OpenAiCompatConfig};

/// Provider-defined call configuration (temperature, max_tokens, n, ...).
///
/// Keys are passed through opaquely; each client picks the ones it understands.
pub type CallConfig = serde_json::Map<String, serde_json::Value>;

/// Shared handle to a model client. This is what Predict units store as their
/// model parameter.
pub type ModelRef = Arc<dyn ModelClient>;

/// Speaker of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged block of text exchanged with a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The transport boundary to a language model.
///
/// Implementations return at least one candidate text. More than one is
/// expected only when the configuration asks for several completions (`n`).
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Human-readable identity of the model.
    fn name(&self) -> &str;

    /// The model a request with `config` is actually sent to; recorded in
    /// traces. Clients that honour a per-call `model` key override this.
    fn model_for(&self, config: &CallConfig) -> String {
        let _ = config;
        self.name().to_string()
    }

    /// Sends `messages` and returns the raw candidate texts.
    async fn complete(
        &self,
        messages: &[Message],
        config: &CallConfig,
    ) -> Result<Vec<String>, LLMError>;
}

impl fmt::Debug for dyn ModelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClient").field("name", &self.name()).finish()
    }
}

/// The per-call `model` key, falling back to `default`.
#[cfg(feature = "llm")]
pub(crate) fn config_model(config: &CallConfig, default: &str) -> String {
    config
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or(default)
        .to_string()
}

/// Reads an optional `f32` setting from a call configuration.
#[cfg(feature = "llm")]
pub(crate) fn config_f32(config: &CallConfig, key: &str) -> Option<f32> {
    config.get(key).and_then(|v| v.as_f64()).map(|v| v as f32)
}

/// Reads an optional `u32` setting from a call configuration.
#[cfg(feature = "llm")]
pub(crate) fn config_u32(config: &CallConfig, key: &str) -> Option<u32> {
    config
        .get(key)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
}

/// Reads stop sequences, accepting either a single string or a list.
#[cfg(feature = "llm")]
pub(crate) fn config_stop(config: &CallConfig) -> Option<Vec<String>> {
    match config.get("stop")? {
        serde_json::Value::String(s) => Some(vec![s.clone()]),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    }
}
