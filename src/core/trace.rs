use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::demo::Inputs;
use crate::core::error::PredictError;
use crate::core::parameters::ResolvedParameters;
use crate::core::prediction::Prediction;

/// A single entry in the execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Milliseconds since the Unix epoch at which the call completed.
    pub timestamp: u64,
    pub predictor: String,
    pub signature_hash: String,
    pub inputs: Inputs,
    pub parameters: ResolvedParameters,
    pub outputs: Prediction,
}

impl TraceEntry {
    pub fn new(
        predictor: impl Into<String>,
        signature_hash: impl Into<String>,
        inputs: Inputs,
        parameters: ResolvedParameters,
        outputs: Prediction,
    ) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            timestamp,
            predictor: predictor.into(),
            signature_hash: signature_hash.into(),
            inputs,
            parameters,
            outputs,
        }
    }
}

/// Append-only log owned by one Predict unit.
///
/// Appends are serialized by a mutex; readers get snapshots. Only external
/// callers clear it.
#[derive(Debug, Default)]
pub struct TraceLog {
    entries: Mutex<Vec<TraceEntry>>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: TraceEntry) {
        self.lock().push(entry);
    }

    /// Snapshot of every entry, oldest first.
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<TraceEntry> {
        self.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns every entry.
    pub fn clear(&self) -> Vec<TraceEntry> {
        std::mem::take(&mut *self.lock())
    }

    /// One JSON object per line, oldest first.
    pub fn export_jsonl(&self) -> Result<String, PredictError> {
        let mut out = String::new();
        for entry in self.lock().iter() {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TraceEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Trait for recording execution traces outside the owning unit.
pub trait Telemetry: Send + Sync {
    fn record(&self, entry: TraceEntry);
    fn flush(&self);
}

/// Simple in-memory collector for traces.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    traces: Mutex<Vec<TraceEntry>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_traces(&self) -> Vec<TraceEntry> {
        self.traces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Telemetry for MemoryTelemetry {
    fn record(&self, entry: TraceEntry) {
        self.traces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    fn flush(&self) {
        // No-op for memory collector
    }
}
