use thiserror::Error;

/// Failure raised by a [`ModelClient`](crate::llm::ModelClient).
///
/// The core never inspects or retries these; they travel to the caller
/// wrapped in [`PredictError::ModelRequest`](crate::PredictError::ModelRequest).
#[derive(Debug, Error)]
pub enum LLMError {
    #[cfg(feature = "llm")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Ollama error: {0}")]
    OllamaError(String),

    #[error("OpenAI-compatible provider error: {0}")]
    OpenAiCompatError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),
}
