//! Prompt formatting and response parsing.
//!
//! An [`Adapter`] is the only place where structured data (signature, demos,
//! input values) becomes model-facing text and back. Predict units depend on
//! this two-operation contract alone, so the wire encoding is swappable:
//! [`ChatAdapter`] speaks the `[[ ## field ## ]]` marker protocol and
//! [`JsonAdapter`] asks for a single JSON object.

pub mod chat;
pub mod helpers;
pub mod json;

use indexmap::IndexMap;

pub use chat::ChatAdapter;
pub use helpers::{HelperContext, HelperTable, TemplateHelper};
pub use json::JsonAdapter;

use crate::core::demo::{render_value, Demo, FieldValue, Inputs};
use crate::core::error::PredictError;
use crate::core::formatter::field_marker;
use crate::core::signature::{Field, Signature};
use crate::llm::Message;

/// Raw, untyped output values keyed by output field name, in declared
/// output order.
pub type ParsedFields = IndexMap<String, String>;

/// Translation boundary between structured values and model text.
pub trait Adapter: Send + Sync {
    /// Short identifier, recorded in traces.
    fn name(&self) -> &str;

    /// Builds the full message sequence for one call: a single system
    /// message, a user/assistant pair per demo, and a final user message.
    fn format(
        &self,
        signature: &Signature,
        demos: &[Demo],
        inputs: &Inputs,
    ) -> Result<Vec<Message>, PredictError>;

    /// Extracts every output field of `signature` from a raw completion.
    fn parse(&self, signature: &Signature, raw: &str) -> Result<ParsedFields, PredictError>;
}

/// Checks that `inputs` carries exactly the signature's input fields.
/// Missing fields are reported before unexpected ones, each in a
/// deterministic order.
pub fn validate_inputs(signature: &Signature, inputs: &Inputs) -> Result<(), PredictError> {
    if let Some(missing) = signature.input_names().find(|name| !inputs.contains_key(*name)) {
        return Err(PredictError::MissingInputField(missing.to_string()));
    }
    if let Some(extra) = inputs
        .keys()
        .find(|key| !signature.input_fields().iter().any(|f| &f.name == *key))
    {
        return Err(PredictError::UnexpectedInputField(extra.clone()));
    }
    Ok(())
}

/// Renders `[[ ## name ## ]]\nvalue\n\n` for every field that has a value,
/// in the order of `fields`.
pub(crate) fn render_marked<'a, F>(fields: &[Field], mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<&'a FieldValue>,
{
    let mut out = String::new();
    for field in fields {
        if let Some(value) = lookup(&field.name) {
            out.push_str(&field_marker(&field.name));
            out.push('\n');
            out.push_str(&render_value(value));
            out.push_str("\n\n");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inputs, signature};

    #[test]
    fn test_validate_inputs() {
        let sig = signature!("context, question -> answer");

        assert!(validate_inputs(&sig, &inputs! { "question" => "q", "context" => "c" }).is_ok());
        assert!(matches!(
            validate_inputs(&sig, &inputs! { "question" => "q" }),
            Err(PredictError::MissingInputField(name)) if name == "context"
        ));
        assert!(matches!(
            validate_inputs(&sig, &inputs! { "question" => "q", "context" => "c", "hint" => "h" }),
            Err(PredictError::UnexpectedInputField(name)) if name == "hint"
        ));
        // an output name is not a valid input
        assert!(matches!(
            validate_inputs(&sig, &inputs! { "question" => "q", "context" => "c", "answer" => "a" }),
            Err(PredictError::UnexpectedInputField(name)) if name == "answer"
        ));
    }

    #[test]
    fn test_render_marked_follows_field_order() {
        let sig = signature!("a, b -> c");
        let values = inputs! { "b" => 2, "a" => "one" };
        let rendered = render_marked(sig.input_fields(), |name| values.get(name));
        assert_eq!(rendered, "[[ ## a ## ]]\none\n\n[[ ## b ## ]]\n2\n\n");
    }
}
