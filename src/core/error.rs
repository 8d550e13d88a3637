use thiserror::Error;

use crate::llm::LLMError;

/// Everything that can go wrong between declaring a signature and receiving a
/// parsed prediction. Nothing here is retried by the core.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The caller did not supply a declared input field.
    #[error("missing input field '{0}'")]
    MissingInputField(String),

    /// The caller supplied a key the signature does not declare as an input.
    #[error("unexpected input field '{0}'")]
    UnexpectedInputField(String),

    /// A field name is already used by an input or output of the signature.
    #[error("duplicate field '{0}'")]
    DuplicateField(String),

    /// The model response did not contain the marker for a required output.
    #[error("output field '{0}' not found in model response")]
    FieldNotFound(String),

    /// No model on the call, the Predict unit, or the settings.
    #[error("no language model configured")]
    NoModelConfigured,

    /// The model client failed; the underlying error is preserved as-is.
    #[error(transparent)]
    ModelRequest(#[from] LLMError),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A prediction record was built with a key its signature does not declare.
    #[error("unknown output field '{0}'")]
    UnknownOutputField(String),

    #[error("cannot coerce field '{field}' to {expected}: {reason}")]
    Coercion {
        field: String,
        expected: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
