use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::adapter::Adapter;
use crate::core::capability::{Invocable, ParameterHolder};
use crate::core::demo::{Demo, FieldValue, Inputs};
use crate::core::error::PredictError;
use crate::core::parameters::{
    merge_config, resolve_demos, resolve_lm, CallOverrides, Parameters, ResolvedParameters,
};
use crate::core::prediction::Prediction;
use crate::core::settings::{self, Settings};
use crate::core::signature::Signature;
use crate::core::trace::{TraceEntry, TraceLog};
use crate::llm::{CallConfig, LLMError, ModelClient, ModelRef};

/// Whether a Predict unit currently has calls in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictState {
    Idle,
    Calling { in_flight: usize },
}

/// Everything one invocation needs, captured once at its start.
struct Resolved {
    lm: ModelRef,
    adapter: Arc<dyn Adapter>,
    signature: Arc<Signature>,
    parameters: ResolvedParameters,
}

/// Decrements the in-flight counter when a call ends, including when its
/// future is dropped mid-flight.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Binds one [`Signature`] to optimizer-visible parameters and runs it
/// against a language model.
///
/// Each call resolves its parameters (call overrides, then the unit's stored
/// values, then [`Settings`]), formats messages through the adapter, makes
/// exactly one model round trip, parses the reply and records a
/// [`TraceEntry`]. Failed or cancelled calls leave no trace.
///
/// All methods take `&self`; share a unit across tasks with `Arc<Predict>`.
pub struct Predict {
    id: String,
    signature: RwLock<Arc<Signature>>,
    parameters: RwLock<Parameters>,
    adapter: Option<Arc<dyn Adapter>>,
    trace: TraceLog,
    in_flight: AtomicUsize,
}

impl Predict {
    /// Creates a unit with an auto-generated id.
    pub fn new(signature: Signature) -> Self {
        let id = format!("predict_{}", uuid::Uuid::new_v4().simple());
        log::debug!("Auto-generated predictor id '{}' for '{}'", id, signature);
        Self::with_id(id, signature)
    }

    pub fn with_id(id: impl Into<String>, signature: Signature) -> Self {
        Self {
            id: id.into(),
            signature: RwLock::new(Arc::new(signature)),
            parameters: RwLock::new(Parameters::default()),
            adapter: None,
            trace: TraceLog::new(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Bind a model to this unit.
    pub fn with_lm(self, lm: impl ModelClient + 'static) -> Self {
        self.set_lm(Some(Arc::new(lm)));
        self
    }

    pub fn with_demos(self, demos: Vec<Demo>) -> Self {
        self.set_demos(demos);
        self
    }

    /// Set one stored configuration key.
    pub fn with_config(self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.write_parameters().config.insert(key.into(), value.into());
        self
    }

    /// Use `adapter` instead of the one carried by [`Settings`].
    pub fn with_adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    pub fn state(&self) -> PredictState {
        match self.in_flight.load(Ordering::SeqCst) {
            0 => PredictState::Idle,
            n => PredictState::Calling { in_flight: n },
        }
    }

    pub fn trace_log(&self) -> &TraceLog {
        &self.trace
    }

    /// Runs one invocation against `settings`.
    pub async fn invoke(
        &self,
        settings: &Settings,
        inputs: Inputs,
        overrides: CallOverrides,
    ) -> Result<Prediction, PredictError> {
        let resolved = self.resolve(settings, &overrides)?;
        let _guard = InFlight::enter(&self.in_flight);

        let messages = resolved.adapter.format(
            &resolved.signature,
            &resolved.parameters.demos,
            &inputs,
        )?;

        log::debug!(
            "Invoking '{}' with model '{}' ({} demos, {} messages)",
            self.id,
            resolved.parameters.model,
            resolved.parameters.demos.len(),
            messages.len()
        );

        let candidates = resolved
            .lm
            .complete(&messages, &resolved.parameters.config)
            .await?;
        if candidates.is_empty() {
            return Err(LLMError::InvalidResponse(format!(
                "model '{}' returned no completions",
                resolved.parameters.model
            ))
            .into());
        }

        let parsed = candidates
            .iter()
            .map(|raw| resolved.adapter.parse(&resolved.signature, raw))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| log::warn!("'{}' could not parse model response: {}", self.id, e))?;
        let prediction = Prediction::with_completions(&resolved.signature, parsed)?;

        let entry = TraceEntry::new(
            self.id.clone(),
            resolved.signature.structural_hash(),
            inputs,
            resolved.parameters,
            prediction.clone(),
        );
        if let Some(telemetry) = settings.telemetry() {
            telemetry.record(entry.clone());
        }
        self.trace.append(entry);

        Ok(prediction)
    }

    /// Invokes with the process-wide settings and no overrides.
    pub async fn call(&self, inputs: Inputs) -> Result<Prediction, PredictError> {
        let settings = settings::current();
        self.invoke(&settings, inputs, CallOverrides::default()).await
    }

    /// Invokes once per input set, at most `max_concurrency` at a time.
    /// Results come back in input order.
    pub async fn batch(
        &self,
        settings: &Settings,
        inputs: Vec<Inputs>,
        max_concurrency: usize,
    ) -> Vec<Result<Prediction, PredictError>> {
        stream::iter(inputs)
            .map(|item| self.invoke(settings, item, CallOverrides::default()))
            .buffered(max_concurrency.max(1))
            .collect()
            .await
    }

    fn resolve(
        &self,
        settings: &Settings,
        overrides: &CallOverrides,
    ) -> Result<Resolved, PredictError> {
        let signature = self.signature();
        let stored = self
            .parameters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let lm = resolve_lm(overrides.lm.as_ref(), stored.lm.as_ref(), settings.lm())
            .ok_or(PredictError::NoModelConfigured)?;
        let adapter = self
            .adapter
            .clone()
            .unwrap_or_else(|| Arc::clone(settings.adapter()));
        let demos = resolve_demos(overrides.demos.as_ref(), &stored.demos);
        let config = merge_config([settings.config(), &stored.config, &overrides.config]);

        let parameters = ResolvedParameters {
            model: lm.model_for(&config),
            adapter: adapter.name().to_string(),
            instructions: signature.instruction().to_string(),
            demos,
            config,
        };
        Ok(Resolved {
            lm,
            adapter,
            signature,
            parameters,
        })
    }

    fn write_parameters(&self) -> std::sync::RwLockWriteGuard<'_, Parameters> {
        self.parameters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Predict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predict")
            .field("id", &self.id)
            .field("signature", &self.signature().to_string())
            .field("state", &self.state())
            .field("traces", &self.trace.len())
            .finish()
    }
}

#[async_trait]
impl Invocable for Predict {
    async fn invoke(
        &self,
        settings: &Settings,
        inputs: Inputs,
        overrides: CallOverrides,
    ) -> Result<Prediction, PredictError> {
        Predict::invoke(self, settings, inputs, overrides).await
    }
}

impl ParameterHolder for Predict {
    fn id(&self) -> &str {
        &self.id
    }

    fn signature(&self) -> Arc<Signature> {
        Arc::clone(
            &self
                .signature
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    fn set_signature(&self, signature: Signature) {
        log::debug!("Replacing signature of '{}' with '{}'", self.id, signature);
        *self
            .signature
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(signature);
    }

    fn lm(&self) -> Option<ModelRef> {
        self.parameters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lm
            .clone()
    }

    fn set_lm(&self, lm: Option<ModelRef>) {
        self.write_parameters().lm = lm;
    }

    fn demos(&self) -> Vec<Demo> {
        self.parameters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .demos
            .clone()
    }

    fn set_demos(&self, demos: Vec<Demo>) {
        self.write_parameters().demos = demos;
    }

    fn config(&self) -> CallConfig {
        self.parameters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .config
            .clone()
    }

    fn set_config(&self, config: CallConfig) {
        self.write_parameters().config = config;
    }

    fn trace(&self) -> Vec<TraceEntry> {
        self.trace.entries()
    }

    fn clear_trace(&self) -> Vec<TraceEntry> {
        self.trace.clear()
    }
}
