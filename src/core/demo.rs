//! Worked examples and input records.

use serde::{Deserialize, Serialize};

use crate::core::signature::Signature;

/// The alias for serde_json::Value, used for every field value.
pub type FieldValue = serde_json::Value;

/// Field-name to value mapping supplied to a Predict unit.
pub type Inputs = serde_json::Map<String, FieldValue>;

/// One worked example: values for some or all of a signature's fields.
///
/// Key order inside a demo is irrelevant; rendering always follows the
/// signature's declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Demo {
    values: serde_json::Map<String, FieldValue>,
}

impl Demo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// The subset of this demo that matches the signature's inputs.
    pub fn inputs_for(&self, signature: &Signature) -> Inputs {
        signature
            .input_names()
            .filter_map(|name| self.values.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }
}

impl From<Inputs> for Demo {
    fn from(values: Inputs) -> Self {
        Self { values }
    }
}

/// Renders a value the way it appears in a prompt: strings verbatim,
/// everything else as compact JSON.
pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a [`Demo`]: `demo! { "question" => "2+2?", "answer" => "4" }`
#[macro_export]
macro_rules! demo {
    ($($key:expr => $value:expr),* $(,)?) => {
        $crate::Demo::new()$(.with($key, $value))*
    };
}

/// Build an [`Inputs`] map: `inputs! { "question" => "2+2?" }`
#[macro_export]
macro_rules! inputs {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::Inputs::new();
        $(map.insert(::std::string::String::from($key), $crate::FieldValue::from($value));)*
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("plain text")), "plain text");
        assert_eq!(render_value(&json!(4)), "4");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&json!({"k": [1, 2]})), r#"{"k":[1,2]}"#);
    }

    #[test]
    fn test_inputs_for_filters_to_declared_inputs() {
        let sig = crate::signature!("context, question -> answer");
        let demo = demo! {
            "question" => "Who?",
            "answer" => "Me",
            "context" => "A story",
        };
        let inputs = demo.inputs_for(&sig);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs["context"], json!("A story"));
        assert!(!inputs.contains_key("answer"));
    }

    #[test]
    fn test_demo_serializes_as_plain_object() {
        let demo = Demo::from_pairs([("question", "2+2?"), ("answer", "4")]);
        let value = serde_json::to_value(&demo).unwrap();
        assert_eq!(value, json!({"question": "2+2?", "answer": "4"}));
        let back: Demo = serde_json::from_value(value).unwrap();
        assert_eq!(back, demo);
    }

    #[test]
    fn test_inputs_macro() {
        let inputs = inputs! { "question" => "What is 2+2?", "n" => 3 };
        assert_eq!(inputs["question"], json!("What is 2+2?"));
        assert_eq!(inputs["n"], json!(3));
    }
}
