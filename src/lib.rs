//! # Sigil
//!
//! Declarative, typed prompting for language models. Describe a task as a
//! [`Signature`] (named inputs and outputs plus instructions), bind it to a
//! [`Predict`] unit and let an [`Adapter`] turn it into chat messages and back
//! into fields.
//!
//! ## Features
//!
//! - **Signatures**: immutable field declarations with `prepend`/`append` derivation
//! - **Adapters**: the `[[ ## field ## ]]` marker protocol ([`ChatAdapter`]) or JSON objects ([`JsonAdapter`])
//! - **Tunable units**: demos, instructions, models and call configuration are
//!   exposed to optimizers through [`ParameterHolder`]
//! - **Traces**: every successful call is recorded with the parameters it used
//! - **Optional model clients**: Ollama and OpenAI-compatible endpoints (feature `llm`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sigil::prelude::*;
//!
//! # async fn run() -> Result<(), PredictError> {
//! let lm = DummyLM::new("dummy")
//!     .with_fallback("[[ ## answer ## ]]\n4\n\n[[ ## completed ## ]]");
//! let settings = Settings::new().with_lm(lm);
//!
//! let qa = Predict::new(signature!("question -> answer"));
//! let prediction = qa
//!     .invoke(&settings, inputs! { "question" => "What is 2+2?" }, CallOverrides::new())
//!     .await?;
//! assert_eq!(prediction.get("answer"), Some("4"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`formatter`]: marker and field-description rendering shared by adapters
//! - [`adapter`]: the [`Adapter`] seam and the template helper table
//! - [`settings`]: the process-wide default [`Settings`]
//! - [`llm`]: the [`ModelClient`] boundary, [`DummyLM`] and (feature `llm`) HTTP clients
//! - [`prelude`]: commonly used types and traits (`use sigil::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

pub use core::{adapter, formatter, settings};

// Signatures and values
pub use core::demo::{render_value, Demo, FieldValue, Inputs};
pub use core::error::PredictError;
pub use core::prediction::Prediction;
pub use core::signature::{Field, FieldType, Signature};

// Adapters
pub use core::adapter::{
    Adapter, ChatAdapter, HelperContext, HelperTable, JsonAdapter, ParsedFields, TemplateHelper,
};

// Predict units and their parameters
pub use core::capability::{Invocable, ParameterHolder};
pub use core::parameters::{CallOverrides, Parameters, ResolvedParameters};
pub use core::predict::{Predict, PredictState};
pub use core::registry::ParameterRegistry;
pub use core::settings::Settings;

// Traces
pub use core::trace::{MemoryTelemetry, Telemetry, TraceEntry, TraceLog};

// ============================================================================
// Model Clients
// ============================================================================

pub mod llm;

pub use llm::{CallConfig, DummyLM, LLMError, Message, ModelClient, ModelRef, Role};

#[cfg(feature = "llm")]
pub use llm::{Ollama, OllamaConfig, OpenAiCompat, OpenAiCompatConfig};

// ============================================================================
// Prelude
// ============================================================================

/// Imports everything needed to declare signatures and run predict units.
///
/// # Example
/// ```rust
/// use sigil::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        demo, inputs, signature,
        // Adapters
        Adapter, ChatAdapter, JsonAdapter,
        // Values
        Demo, Field, FieldType, FieldValue, Inputs, Prediction, PredictError, Signature,
        // Units
        CallOverrides, Invocable, ParameterHolder, ParameterRegistry, Predict, Settings,
        // Models
        CallConfig, DummyLM, LLMError, Message, ModelClient,
        // Traces
        TraceEntry,
    };
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
