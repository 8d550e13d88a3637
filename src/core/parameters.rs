//! Optimizer-visible parameters and their per-call resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::demo::{Demo, FieldValue};
use crate::llm::{CallConfig, ModelRef};

/// The tunable state a Predict unit owns.
#[derive(Clone, Default)]
pub struct Parameters {
    /// Model bound to the unit. `None` defers to the settings default.
    pub lm: Option<ModelRef>,
    /// Few-shot examples, rendered in this order.
    pub demos: Vec<Demo>,
    /// Per-unit configuration, layered over the settings default.
    pub config: CallConfig,
}

impl fmt::Debug for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameters")
            .field("lm", &self.lm.as_ref().map(|lm| lm.name().to_string()))
            .field("demos", &self.demos.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Values supplied for a single invocation. Anything set here wins over the
/// unit's stored parameters.
#[derive(Clone, Default)]
pub struct CallOverrides {
    pub lm: Option<ModelRef>,
    pub demos: Option<Vec<Demo>>,
    pub config: CallConfig,
}

impl CallOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lm(mut self, lm: ModelRef) -> Self {
        self.lm = Some(lm);
        self
    }

    pub fn demos(mut self, demos: Vec<Demo>) -> Self {
        self.demos = Some(demos);
        self
    }

    /// Set one configuration key, e.g. `("temperature", 0.0)`.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for CallOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOverrides")
            .field("lm", &self.lm.as_ref().map(|lm| lm.name().to_string()))
            .field("demos", &self.demos.as_ref().map(Vec::len))
            .field("config", &self.config)
            .finish()
    }
}

/// The parameters one invocation actually used, as recorded in traces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParameters {
    pub model: String,
    pub adapter: String,
    pub instructions: String,
    pub demos: Vec<Demo>,
    pub config: CallConfig,
}

/// Picks the first model present: call, unit, settings.
pub fn resolve_lm(
    call: Option<&ModelRef>,
    stored: Option<&ModelRef>,
    default: Option<&ModelRef>,
) -> Option<ModelRef> {
    call.or(stored).or(default).cloned()
}

/// Picks call-time demos when given, otherwise the stored list.
pub fn resolve_demos(call: Option<&Vec<Demo>>, stored: &[Demo]) -> Vec<Demo> {
    match call {
        Some(demos) => demos.clone(),
        None => stored.to_vec(),
    }
}

/// Merges configuration layers key by key; later layers win.
pub fn merge_config<'a, I>(layers: I) -> CallConfig
where
    I: IntoIterator<Item = &'a CallConfig>,
{
    let mut merged = CallConfig::new();
    for layer in layers {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
