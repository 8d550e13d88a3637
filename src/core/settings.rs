//! Configuration context handed to Predict units.
//!
//! A [`Settings`] value carries the defaults an invocation falls back to:
//! model, adapter, call configuration and an optional telemetry sink. It is
//! passed explicitly to [`Predict::invoke`](crate::Predict::invoke). A
//! process-wide instance can be installed with [`configure`] for callers that
//! prefer [`Predict::call`](crate::Predict::call); it is snapshotted as an
//! `Arc` at the start of every call, so reconfiguring never disturbs a call
//! already in flight.

use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::core::adapter::{Adapter, ChatAdapter};
use crate::core::demo::FieldValue;
use crate::core::trace::Telemetry;
use crate::llm::{CallConfig, ModelClient, ModelRef};

#[derive(Clone)]
pub struct Settings {
    lm: Option<ModelRef>,
    adapter: Arc<dyn Adapter>,
    config: CallConfig,
    telemetry: Option<Arc<dyn Telemetry>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// No default model, the chat adapter, empty configuration.
    pub fn new() -> Self {
        Self {
            lm: None,
            adapter: Arc::new(ChatAdapter::new()),
            config: CallConfig::new(),
            telemetry: None,
        }
    }

    pub fn with_lm(mut self, lm: impl ModelClient + 'static) -> Self {
        self.lm = Some(Arc::new(lm));
        self
    }

    /// Like [`with_lm`](Settings::with_lm), for a client that is already shared.
    pub fn with_lm_ref(mut self, lm: ModelRef) -> Self {
        self.lm = Some(lm);
        self
    }

    pub fn with_adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapter = Arc::new(adapter);
        self
    }

    pub fn with_config(mut self, config: CallConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_config_value(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn lm(&self) -> Option<&ModelRef> {
        self.lm.as_ref()
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    pub fn telemetry(&self) -> Option<&Arc<dyn Telemetry>> {
        self.telemetry.as_ref()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("lm", &self.lm.as_ref().map(|lm| lm.name().to_string()))
            .field("adapter", &self.adapter.name())
            .field("config", &self.config)
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

static GLOBAL_SETTINGS: LazyLock<RwLock<Option<Arc<Settings>>>> =
    LazyLock::new(|| RwLock::new(None));

/// Installs `settings` as the process-wide default, replacing any previous one.
pub fn configure(settings: Settings) {
    log::debug!("Configuring global settings: {:?}", settings);
    *GLOBAL_SETTINGS
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(settings));
}

/// The process-wide default, or empty settings when none is installed.
pub fn current() -> Arc<Settings> {
    GLOBAL_SETTINGS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_else(|| Arc::new(Settings::new()))
}

/// Whether [`configure`] has been called since the last [`reset`].
pub fn is_configured() -> bool {
    GLOBAL_SETTINGS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// Removes the process-wide default.
pub fn reset() {
    *GLOBAL_SETTINGS
        .write()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapter::JsonAdapter;
    use crate::llm::DummyLM;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let settings = Settings::new()
            .with_lm(DummyLM::new("dummy"))
            .with_adapter(JsonAdapter::new())
            .with_config_value("temperature", 0.2);

        assert_eq!(settings.lm().map(|lm| lm.name()), Some("dummy"));
        assert_eq!(settings.adapter().name(), "json");
        assert_eq!(settings.config()["temperature"], json!(0.2));
        assert!(settings.telemetry().is_none());
    }

    #[test]
    fn test_default_uses_chat_adapter() {
        let settings = Settings::default();
        assert!(settings.lm().is_none());
        assert_eq!(settings.adapter().name(), "chat");
    }

    // Global state is exercised in one test to avoid cross-test interference.
    #[test]
    fn test_global_lifecycle() {
        reset();
        assert!(!is_configured());
        assert!(current().lm().is_none());

        configure(Settings::new().with_lm(DummyLM::new("global")));
        assert!(is_configured());
        let snapshot = current();
        assert_eq!(snapshot.lm().map(|lm| lm.name()), Some("global"));

        reset();
        assert!(!is_configured());
        // snapshots taken earlier stay valid
        assert_eq!(snapshot.lm().map(|lm| lm.name()), Some("global"));
    }
}
