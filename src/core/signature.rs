use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::core::error::PredictError;
use crate::core::formatter::COMPLETED;

/// Declared type of a field. Rendered into prompts and used by
/// [`Prediction::coerce`](crate::Prediction::coerce).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    /// Any JSON value (objects, lists, ...).
    Structured,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Structured => "structured",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "str" | "string" => Ok(FieldType::String),
            "float" | "number" => Ok(FieldType::Number),
            "int" | "integer" => Ok(FieldType::Integer),
            "bool" | "boolean" => Ok(FieldType::Boolean),
            "json" | "dict" | "list" | "structured" => Ok(FieldType::Structured),
            other => Err(PredictError::InvalidSignature(format!(
                "unknown field type '{other}'"
            ))),
        }
    }
}

/// A single named field in a signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: String,
}

impl Field {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::String,
            description: description.into(),
        }
    }

    pub fn typed(
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: description.into(),
        }
    }
}

/// The input/output contract of one task, plus its instructions.
///
/// Field order is insertion order and is significant: it fixes the order of
/// prompt sections and the order the model is asked to produce outputs.
/// A signature is never mutated in place once built; the derivation methods
/// ([`prepend`](Signature::prepend), [`append`](Signature::append),
/// [`with_instructions`](Signature::with_instructions)) return new values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawSignature")]
pub struct Signature {
    inputs: Vec<Field>,
    outputs: Vec<Field>,
    #[serde(default)]
    instructions: String,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string input field to the signature.
    pub fn input(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, PredictError> {
        self.typed_input(name, FieldType::String, description)
    }

    /// Add a string output field to the signature.
    pub fn output(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, PredictError> {
        self.typed_output(name, FieldType::String, description)
    }

    pub fn typed_input(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Result<Self, PredictError> {
        let field = Field::typed(name, field_type, description);
        self.ensure_unique(&field.name)?;
        self.inputs.push(field);
        Ok(self)
    }

    pub fn typed_output(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Result<Self, PredictError> {
        let field = Field::typed(name, field_type, description);
        self.ensure_unique(&field.name)?;
        self.outputs.push(field);
        Ok(self)
    }

    /// Set the free-text task instructions.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Returns a copy with the instructions replaced.
    pub fn with_instructions(&self, instructions: impl Into<String>) -> Self {
        self.clone().instructions(instructions)
    }

    /// Returns a copy with a new output field placed before every existing output.
    pub fn prepend(
        &self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Result<Self, PredictError> {
        let field = Field::typed(name, field_type, description);
        self.ensure_unique(&field.name)?;
        let mut derived = self.clone();
        derived.outputs.insert(0, field);
        Ok(derived)
    }

    /// Returns a copy with a new output field placed after every existing output.
    pub fn append(
        &self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Result<Self, PredictError> {
        self.clone().typed_output(name, field_type, description)
    }

    pub fn input_fields(&self) -> &[Field] {
        &self.inputs
    }

    pub fn output_fields(&self) -> &[Field] {
        &self.outputs
    }

    pub fn instruction(&self) -> &str {
        &self.instructions
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|f| f.name.as_str())
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|f| f.name.as_str())
    }

    /// Looks a field up among inputs, then outputs.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .find(|f| f.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|f| f.name == name)
    }

    /// Returns a stable, structural hash of the signature.
    /// Descriptions and instructions are excluded so that prompt refinement
    /// doesn't break structural identity.
    pub fn structural_hash(&self) -> String {
        let mut hasher = DefaultHasher::new();
        for field in &self.inputs {
            field.name.hash(&mut hasher);
        }
        "input_separator".hash(&mut hasher);
        for field in &self.outputs {
            field.name.hash(&mut hasher);
        }
        format!("{:016x}", hasher.finish())
    }

    /// Hash of everything an optimizer may rewrite: instructions and descriptions.
    pub fn instruction_hash(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.instructions.hash(&mut hasher);
        for field in self.inputs.iter().chain(self.outputs.iter()) {
            field.description.hash(&mut hasher);
        }
        format!("{:016x}", hasher.finish())
    }

    fn ensure_unique(&self, name: &str) -> Result<(), PredictError> {
        if name == COMPLETED {
            return Err(PredictError::InvalidSignature(format!(
                "'{COMPLETED}' is reserved for the completion marker"
            )));
        }
        if self.field(name).is_some() {
            return Err(PredictError::DuplicateField(name.to_string()));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawSignature {
    inputs: Vec<Field>,
    outputs: Vec<Field>,
    #[serde(default)]
    instructions: String,
}

impl TryFrom<RawSignature> for Signature {
    type Error = PredictError;

    fn try_from(raw: RawSignature) -> Result<Self, Self::Error> {
        let mut sig = Signature::new().instructions(raw.instructions);
        for field in raw.inputs {
            sig = sig.typed_input(field.name, field.field_type, field.description)?;
        }
        for field in raw.outputs {
            sig = sig.typed_output(field.name, field.field_type, field.description)?;
        }
        Ok(sig)
    }
}

impl FromStr for Signature {
    type Err = PredictError;

    /// Parses shorthand syntax: "input1, input2 -> output1, output2"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split("->").collect();
        if parts.len() != 2 {
            return Err(PredictError::InvalidSignature(
                "signature must contain exactly one '->'".to_string(),
            ));
        }

        let names = |part: &str| {
            part.split(',')
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect::<Vec<String>>()
        };

        let inputs = names(parts[0]);
        let outputs = names(parts[1]);
        if outputs.is_empty() {
            return Err(PredictError::InvalidSignature(
                "signature must declare at least one output field".to_string(),
            ));
        }

        let mut sig = Signature::new();
        for name in inputs {
            sig = sig.input(name, "")?;
        }
        for name in outputs {
            sig = sig.output(name, "")?;
        }
        Ok(sig)
    }
}

impl fmt::Display for Signature {
    /// Renders the compact `a, b -> c` form (types and descriptions are dropped).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs: Vec<&str> = self.input_names().collect();
        let outputs: Vec<&str> = self.output_names().collect();
        write!(f, "{} -> {}", inputs.join(", "), outputs.join(", "))
    }
}

/// Macro for rapid signature creation: signature!("doc -> summary")
#[macro_export]
macro_rules! signature {
    ($s:expr) => {
        $s.parse::<$crate::Signature>()
            .expect("Invalid signature shorthand")
    };
    ($s:expr, $instructions:expr) => {
        $s.parse::<$crate::Signature>()
            .expect("Invalid signature shorthand")
            .instructions($instructions)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_parsing() {
        let sig: Signature = "context, question -> answer".parse().unwrap();
        assert_eq!(sig.input_names().collect::<Vec<_>>(), ["context", "question"]);
        assert_eq!(sig.output_names().collect::<Vec<_>>(), ["answer"]);
        assert!(sig.input_fields().iter().all(|f| f.field_type == FieldType::String));
        assert!(sig.output_fields()[0].description.is_empty());
        assert_eq!(sig.to_string(), "context, question -> answer");
    }

    #[test]
    fn test_shorthand_rejects_malformed() {
        assert!(matches!(
            "question answer".parse::<Signature>(),
            Err(PredictError::InvalidSignature(_))
        ));
        assert!(matches!(
            "a -> b -> c".parse::<Signature>(),
            Err(PredictError::InvalidSignature(_))
        ));
        assert!(matches!(
            "question ->".parse::<Signature>(),
            Err(PredictError::InvalidSignature(_))
        ));
        assert!(matches!(
            "a, b -> a".parse::<Signature>(),
            Err(PredictError::DuplicateField(name)) if name == "a"
        ));
    }

    #[test]
    fn test_prepend_and_append_derive_new_signatures() {
        let base = signature!("question -> answer");
        let cot = base
            .prepend("reasoning", FieldType::String, "Think step by step")
            .unwrap();
        let scored = cot
            .append("confidence", FieldType::Number, "")
            .unwrap();

        assert_eq!(base.output_names().collect::<Vec<_>>(), ["answer"]);
        assert_eq!(cot.output_names().collect::<Vec<_>>(), ["reasoning", "answer"]);
        assert_eq!(
            scored.output_names().collect::<Vec<_>>(),
            ["reasoning", "answer", "confidence"]
        );
        assert_eq!(scored.input_names().collect::<Vec<_>>(), ["question"]);
    }

    #[test]
    fn test_derivation_rejects_collisions() {
        let base = signature!("question -> answer");
        assert!(matches!(
            base.prepend("question", FieldType::String, ""),
            Err(PredictError::DuplicateField(name)) if name == "question"
        ));
        assert!(matches!(
            base.append("answer", FieldType::String, ""),
            Err(PredictError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_completion_marker_name_is_reserved() {
        assert!(matches!(
            "q -> completed, answer".parse::<Signature>(),
            Err(PredictError::InvalidSignature(_))
        ));
        assert!(matches!(
            "completed -> answer".parse::<Signature>(),
            Err(PredictError::InvalidSignature(_))
        ));
        let base = signature!("question -> answer");
        assert!(matches!(
            base.append("completed", FieldType::Boolean, ""),
            Err(PredictError::InvalidSignature(_))
        ));
        let raw = serde_json::json!({
            "inputs": [{"name": "q", "type": "string", "description": ""}],
            "outputs": [{"name": "completed", "type": "string", "description": ""}],
        });
        assert!(serde_json::from_value::<Signature>(raw).is_err());
    }

    #[test]
    fn test_hashes_track_the_right_changes() {
        let a = signature!("a, b -> c");
        let b = signature!("b, a -> c");
        let reworded = a.with_instructions("Be terse.");

        assert_eq!(a.structural_hash(), signature!("a, b -> c").structural_hash());
        assert_ne!(a.structural_hash(), b.structural_hash());
        assert_eq!(a.structural_hash(), reworded.structural_hash());
        assert_ne!(a.instruction_hash(), reworded.instruction_hash());
        assert_eq!(a.instruction(), "");
    }

    #[test]
    fn test_field_type_aliases() {
        assert_eq!("int".parse::<FieldType>().unwrap(), FieldType::Integer);
        assert_eq!("bool".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert_eq!("json".parse::<FieldType>().unwrap(), FieldType::Structured);
        assert!("tensor".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_order() {
        let sig = Signature::new()
            .typed_input("doc", FieldType::String, "A document")
            .unwrap()
            .typed_output("score", FieldType::Number, "")
            .unwrap()
            .typed_output("label", FieldType::String, "")
            .unwrap()
            .instructions("Grade it.");
        let json = serde_json::to_string(&sig).unwrap();
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
        assert_eq!(back.output_names().collect::<Vec<_>>(), ["score", "label"]);

        let clash = r#"{"inputs":[{"name":"x"}],"outputs":[{"name":"x"}]}"#;
        assert!(serde_json::from_str::<Signature>(clash).is_err());
    }
}
