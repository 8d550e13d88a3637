use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::capability::ParameterHolder;
use crate::core::trace::TraceEntry;

/// Named collection of tunable units.
///
/// An optimizer receives one of these and works purely through the
/// [`ParameterHolder`] capability: reading traces, then rewriting demos,
/// instructions, models or configuration.
#[derive(Default, Clone)]
pub struct ParameterRegistry {
    holders: BTreeMap<String, Arc<dyn ParameterHolder>>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `holder` under its own id.
    pub fn register(&mut self, holder: Arc<dyn ParameterHolder>) {
        let name = holder.id().to_string();
        self.register_as(name, holder);
    }

    /// Registers `holder` under `name`, replacing any previous entry.
    pub fn register_as(&mut self, name: impl Into<String>, holder: Arc<dyn ParameterHolder>) {
        let name = name.into();
        if self.holders.contains_key(&name) {
            log::warn!("Parameter holder '{}' was already registered, overwriting it.", name);
        }
        self.holders.insert(name, holder);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ParameterHolder>> {
        self.holders.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn ParameterHolder>> {
        self.holders.remove(name)
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Every holder with its registered name, sorted by name.
    pub fn named_parameters(&self) -> Vec<(&str, &Arc<dyn ParameterHolder>)> {
        self.holders
            .iter()
            .map(|(name, holder)| (name.as_str(), holder))
            .collect()
    }

    /// All trace entries of all holders, grouped by name.
    pub fn traces(&self) -> BTreeMap<String, Vec<TraceEntry>> {
        self.holders
            .iter()
            .map(|(name, holder)| (name.clone(), holder.trace()))
            .collect()
    }

    /// Clears every holder's trace.
    pub fn clear_traces(&self) {
        for holder in self.holders.values() {
            holder.clear_trace();
        }
    }
}

impl fmt::Debug for ParameterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterRegistry")
            .field("holders", &self.holders.keys().collect::<Vec<_>>())
            .finish()
    }
}
