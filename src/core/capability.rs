use async_trait::async_trait;
use std::sync::Arc;

use crate::core::demo::{Demo, Inputs};
use crate::core::error::PredictError;
use crate::core::parameters::CallOverrides;
use crate::core::prediction::Prediction;
use crate::core::settings::Settings;
use crate::core::signature::Signature;
use crate::core::trace::TraceEntry;
use crate::llm::{CallConfig, ModelRef};

/// Units that can be called with input values to produce a prediction.
#[async_trait]
pub trait Invocable: Send + Sync {
    async fn invoke(
        &self,
        settings: &Settings,
        inputs: Inputs,
        overrides: CallOverrides,
    ) -> Result<Prediction, PredictError>;
}

/// Units that expose tunable parameters to an optimizer.
///
/// Every setter is an immediate replacement; nothing is validated until the
/// next invocation. Calls already in flight keep the values they started with.
pub trait ParameterHolder: Send + Sync {
    /// Stable identity, used in traces and registries.
    fn id(&self) -> &str;

    fn signature(&self) -> Arc<Signature>;
    fn set_signature(&self, signature: Signature);

    /// Rewrites the instructions by swapping in a derived signature.
    fn set_instructions(&self, instructions: &str) {
        let derived = self.signature().with_instructions(instructions);
        self.set_signature(derived);
    }

    fn lm(&self) -> Option<ModelRef>;
    fn set_lm(&self, lm: Option<ModelRef>);

    fn demos(&self) -> Vec<Demo>;
    /// Replaces the whole demo list.
    fn set_demos(&self, demos: Vec<Demo>);

    fn config(&self) -> CallConfig;
    fn set_config(&self, config: CallConfig);

    /// Snapshot of the execution trace.
    fn trace(&self) -> Vec<TraceEntry>;
    /// Drops every recorded entry, returning them.
    fn clear_trace(&self) -> Vec<TraceEntry>;
}
