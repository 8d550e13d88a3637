use crate::core::adapter::helpers::{HelperContext, HelperTable};
use crate::core::adapter::{render_marked, validate_inputs, Adapter, ParsedFields};
use crate::core::demo::{Demo, Inputs};
use crate::core::error::PredictError;
use crate::core::formatter::{self, completed_marker, field_marker};
use crate::core::signature::Signature;
use crate::llm::Message;

const DEFAULT_SECTIONS: [&str; 3] = ["field_descriptions", "field_structure", "task_description"];

/// The `[[ ## field ## ]]` marker protocol.
///
/// The system message is assembled from named [`HelperTable`] sections, so
/// callers can reword any part of it without touching the marker scheme
/// used for demos, inputs and parsing.
#[derive(Debug, Clone)]
pub struct ChatAdapter {
    helpers: HelperTable,
    sections: Vec<String>,
}

impl Default for ChatAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatAdapter {
    pub fn new() -> Self {
        Self {
            helpers: HelperTable::standard(),
            sections: DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Registers or replaces a helper.
    pub fn with_helper<F>(mut self, name: impl Into<String>, helper: F) -> Self
    where
        F: Fn(&HelperContext<'_>, &Signature, &[Demo]) -> String + Send + Sync + 'static,
    {
        self.helpers.register(name, helper);
        self
    }

    /// Sets which helpers make up the system message, in order.
    pub fn with_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections = sections.into_iter().map(Into::into).collect();
        self
    }

    pub fn helpers(&self) -> &HelperTable {
        &self.helpers
    }

    fn system_message(&self, signature: &Signature, demos: &[Demo], inputs: &Inputs) -> String {
        let ctx = HelperContext { inputs };
        self.sections
            .iter()
            .map(|section| self.helpers.render(section, &ctx, signature, demos))
            .filter(|rendered| !rendered.is_empty())
            .collect::<Vec<String>>()
            .join("\n")
    }

    fn user_message(&self, signature: &Signature, inputs: &Inputs) -> String {
        let mut message = render_marked(signature.input_fields(), |name| inputs.get(name));
        message.push_str(&formatter::output_request(signature));
        message
    }

    fn demo_user_message(&self, signature: &Signature, demo: &Demo) -> String {
        render_marked(signature.input_fields(), |name| demo.get(name))
            .trim_end()
            .to_string()
    }

    fn demo_assistant_message(&self, signature: &Signature, demo: &Demo) -> String {
        let mut message = render_marked(signature.output_fields(), |name| demo.get(name));
        message.push_str(&completed_marker());
        message
    }
}

impl Adapter for ChatAdapter {
    fn name(&self) -> &str {
        "chat"
    }

    fn format(
        &self,
        signature: &Signature,
        demos: &[Demo],
        inputs: &Inputs,
    ) -> Result<Vec<Message>, PredictError> {
        validate_inputs(signature, inputs)?;

        let mut messages = Vec::with_capacity(demos.len() * 2 + 2);
        messages.push(Message::system(self.system_message(signature, demos, inputs)));
        for demo in demos {
            messages.push(Message::user(self.demo_user_message(signature, demo)));
            messages.push(Message::assistant(self.demo_assistant_message(signature, demo)));
        }
        messages.push(Message::user(self.user_message(signature, inputs)));

        log::trace!("Formatted {} messages for '{}'", messages.len(), signature);
        Ok(messages)
    }

    fn parse(&self, signature: &Signature, raw: &str) -> Result<ParsedFields, PredictError> {
        let completed = completed_marker();
        let markers: Vec<(String, String)> = signature
            .output_names()
            .map(|name| (name.to_string(), field_marker(name)))
            .collect();

        let mut parsed = ParsedFields::new();
        for (name, marker) in &markers {
            let Some(found) = raw.find(marker.as_str()) else {
                log::warn!("Response is missing output field '{}'", name);
                return Err(PredictError::FieldNotFound(name.clone()));
            };
            let start = found + marker.len();
            let rest = &raw[start..];

            let end = markers
                .iter()
                .map(|(_, m)| m.as_str())
                .chain(std::iter::once(completed.as_str()))
                .filter_map(|m| rest.find(m))
                .min();

            let value = match end {
                Some(end) => rest[..end].trim(),
                None => strip_closing_fence(rest.trim()),
            };
            parsed.insert(name.clone(), value.to_string());
        }
        Ok(parsed)
    }
}

/// Drops a code fence standing alone on the last line. Only applies to a
/// value that runs to the end of the text, where the model's own markdown
/// wrapping would otherwise leak into it.
fn strip_closing_fence(value: &str) -> &str {
    match value.rsplit_once('\n') {
        Some((body, last)) if last.trim() == "```" => body.trim_end(),
        _ => value,
    }
}
