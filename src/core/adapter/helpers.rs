//! Named render functions used to assemble system messages.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::demo::{Demo, Inputs};
use crate::core::formatter;
use crate::core::signature::Signature;

/// Per-call data available to a helper beyond the signature and demos.
pub struct HelperContext<'a> {
    pub inputs: &'a Inputs,
}

/// A pure render function. Helpers must not fail; a helper with nothing to
/// say returns an empty string.
pub type TemplateHelper =
    Arc<dyn Fn(&HelperContext<'_>, &Signature, &[Demo]) -> String + Send + Sync>;

/// Registered mapping from helper name to render function.
#[derive(Clone, Default)]
pub struct HelperTable {
    helpers: HashMap<String, TemplateHelper>,
}

impl HelperTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The helpers the chat protocol relies on:
    /// `field_descriptions`, `field_structure` and `task_description`.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register("field_descriptions", |_, sig, _| {
            formatter::field_descriptions(sig)
        });
        table.register("field_structure", |_, sig, _| {
            formatter::structural_template(sig)
        });
        table.register("task_description", |_, sig, _| {
            formatter::task_description(sig)
        });
        table
    }

    /// Registers `helper` under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&HelperContext<'_>, &Signature, &[Demo]) -> String + Send + Sync + 'static,
    {
        let name = name.into();
        if self.helpers.contains_key(&name) {
            log::debug!("Replacing template helper '{}'", name);
        }
        self.helpers.insert(name, Arc::new(helper));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.helpers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs the named helper. Unknown names render as an empty string.
    pub fn render(
        &self,
        name: &str,
        ctx: &HelperContext<'_>,
        signature: &Signature,
        demos: &[Demo],
    ) -> String {
        match self.helpers.get(name) {
            Some(helper) => helper(ctx, signature, demos),
            None => {
                log::warn!("Template helper '{}' is not registered", name);
                String::new()
            }
        }
    }
}

impl fmt::Debug for HelperTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperTable")
            .field("helpers", &self.names())
            .finish()
    }
}
