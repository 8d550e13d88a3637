use serde_json::{Map, Value};

use crate::core::adapter::{render_marked, validate_inputs, Adapter, ParsedFields};
use crate::core::demo::{render_value, Demo, Inputs};
use crate::core::error::PredictError;
use crate::core::formatter::{self, field_marker};
use crate::core::signature::Signature;
use crate::llm::Message;

/// Structured-data encoding: inputs are still delimited with markers, but the
/// model is asked to answer with one JSON object keyed by output field name.
#[derive(Debug, Clone, Default)]
pub struct JsonAdapter;

impl JsonAdapter {
    pub fn new() -> Self {
        Self
    }

    fn system_message(&self, signature: &Signature) -> Result<String, PredictError> {
        let mut structure = String::from(
            "All interactions will be structured in the following way, with the appropriate values filled in.\n\n\
             Inputs will have the following structure:\n\n",
        );
        for field in signature.input_fields() {
            structure.push_str(&format!("{}\n{{{}}}\n\n", field_marker(&field.name), field.name));
        }
        structure.push_str("Outputs will be a JSON object with the following fields.\n\n");
        let skeleton: Map<String, Value> = signature
            .output_fields()
            .iter()
            .map(|f| {
                let note = formatter::type_note(&f.field_type)
                    .map(|n| format!(" ({n})"))
                    .unwrap_or_default();
                (f.name.clone(), Value::String(format!("{{{}}}{}", f.name, note)))
            })
            .collect();
        structure.push_str(&serde_json::to_string_pretty(&skeleton)?);
        structure.push('\n');

        Ok(format!(
            "{}\n{}\n{}",
            formatter::field_descriptions(signature),
            structure,
            formatter::task_description(signature)
        ))
    }

    fn user_message(&self, signature: &Signature, inputs: &Inputs) -> String {
        let mut message = render_marked(signature.input_fields(), |name| inputs.get(name));
        let order = signature
            .output_names()
            .map(|n| format!("`{n}`"))
            .collect::<Vec<String>>()
            .join(", then ");
        message.push_str(&format!(
            "Respond with a JSON object in the following order of fields: {order}."
        ));
        message
    }

    /// The demo's outputs as a pretty-printed object, keys in declared order.
    fn demo_assistant_message(
        &self,
        signature: &Signature,
        demo: &Demo,
    ) -> Result<String, PredictError> {
        let outputs: Map<String, Value> = signature
            .output_fields()
            .iter()
            .filter_map(|f| demo.get(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect();
        Ok(serde_json::to_string_pretty(&outputs)?)
    }
}

/// Finds the first `{` from which a complete JSON object can be read,
/// ignoring any prose or fencing around it.
fn first_object(raw: &str) -> Option<Map<String, Value>> {
    raw.match_indices('{').find_map(|(idx, _)| {
        let mut stream = serde_json::Deserializer::from_str(&raw[idx..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

impl Adapter for JsonAdapter {
    fn name(&self) -> &str {
        "json"
    }

    fn format(
        &self,
        signature: &Signature,
        demos: &[Demo],
        inputs: &Inputs,
    ) -> Result<Vec<Message>, PredictError> {
        validate_inputs(signature, inputs)?;

        let mut messages = Vec::with_capacity(demos.len() * 2 + 2);
        messages.push(Message::system(self.system_message(signature)?));
        for demo in demos {
            let user = render_marked(signature.input_fields(), |name| demo.get(name));
            messages.push(Message::user(user.trim_end()));
            messages.push(Message::assistant(self.demo_assistant_message(signature, demo)?));
        }
        messages.push(Message::user(self.user_message(signature, inputs)));
        Ok(messages)
    }

    fn parse(&self, signature: &Signature, raw: &str) -> Result<ParsedFields, PredictError> {
        let Some(object) = first_object(raw) else {
            let first = signature.output_names().next().unwrap_or_default();
            log::warn!("Response contains no JSON object");
            return Err(PredictError::FieldNotFound(first.to_string()));
        };

        let mut parsed = ParsedFields::new();
        for name in signature.output_names() {
            let value = object
                .get(name)
                .ok_or_else(|| PredictError::FieldNotFound(name.to_string()))?;
            parsed.insert(name.to_string(), render_value(value).trim().to_string());
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::{demo, inputs, signature};

    #[test]
    fn test_format_layout() {
        let sig = signature!("question -> reasoning, answer");
        let demos = vec![demo! { "question" => "2+2?", "answer" => 4, "reasoning" => "Add." }];
        let messages = JsonAdapter::new()
            .format(&sig, &demos, &inputs! { "question" => "3+3?" })
            .unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Outputs will be a JSON object"));
        assert!(messages[0].content.contains(
            "{\n  \"reasoning\": \"{reasoning}\",\n  \"answer\": \"{answer}\"\n}"
        ));
        assert_eq!(messages[1].content, "[[ ## question ## ]]\n2+2?");
        assert_eq!(
            messages[2].content,
            "{\n  \"reasoning\": \"Add.\",\n  \"answer\": 4\n}"
        );
        assert!(messages[3].content.ends_with(
            "Respond with a JSON object in the following order of fields: `reasoning`, then `answer`."
        ));
    }

    #[test]
    fn test_parse_fenced_json() {
        let sig = signature!("question -> reasoning, answer");
        let raw = "Here is my answer:\n```json\n{\"reasoning\": \"Add.\", \"answer\": 4}\n```";
        let parsed = JsonAdapter::new().parse(&sig, raw).unwrap();
        assert_eq!(parsed["reasoning"], "Add.");
        assert_eq!(parsed["answer"], "4");
    }

    #[test]
    fn test_parse_missing_key_and_missing_object() {
        let sig = signature!("question -> reasoning, answer");
        let adapter = JsonAdapter::new();
        assert!(matches!(
            adapter.parse(&sig, "{\"reasoning\": \"Add.\"}"),
            Err(PredictError::FieldNotFound(name)) if name == "answer"
        ));
        assert!(matches!(
            adapter.parse(&sig, "no json here {"),
            Err(PredictError::FieldNotFound(name)) if name == "reasoning"
        ));
    }

    #[test]
    fn test_parse_round_trips_demo_rendering() {
        let sig = signature!("question -> reasoning, answer");
        let demo = demo! { "reasoning" => "Line one.\nLine two.", "answer" => "42" };
        let adapter = JsonAdapter::new();
        let parsed = adapter
            .parse(&sig, &adapter.demo_assistant_message(&sig, &demo).unwrap())
            .unwrap();
        assert_eq!(parsed["reasoning"], "Line one.\nLine two.");
        assert_eq!(parsed["answer"], "42");
    }
}
