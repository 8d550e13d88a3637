//! Immutable result records returned by Predict units.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Index;

use crate::core::adapter::ParsedFields;
use crate::core::demo::{Demo, FieldValue};
use crate::core::error::PredictError;
use crate::core::signature::{FieldType, Signature};

/// Parsed output of one invocation.
///
/// The key set is fixed when the record is built and is a subset of the
/// signature's outputs; there is no way to add or change a value afterwards.
/// Additional candidates (when several completions were requested) are kept
/// alongside the primary one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    fields: ParsedFields,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    completions: Vec<ParsedFields>,
}

impl Prediction {
    /// Builds a record, rejecting any key that is not an output of `signature`.
    pub fn new(signature: &Signature, fields: ParsedFields) -> Result<Self, PredictError> {
        Ok(Self {
            fields: Self::in_declared_order(signature, fields)?,
            completions: Vec::new(),
        })
    }

    /// Builds a record from several parsed candidates. The first is primary.
    pub fn with_completions(
        signature: &Signature,
        candidates: Vec<ParsedFields>,
    ) -> Result<Self, PredictError> {
        if candidates.is_empty() {
            return Self::new(signature, ParsedFields::new());
        }
        let mut candidates = candidates
            .into_iter()
            .map(|candidate| Self::in_declared_order(signature, candidate))
            .collect::<Result<Vec<_>, _>>()?;
        let fields = candidates.remove(0);
        Ok(Self {
            fields,
            completions: candidates,
        })
    }

    /// Rejects keys the signature does not declare and reorders the rest to
    /// follow the signature's outputs.
    fn in_declared_order(
        signature: &Signature,
        mut fields: ParsedFields,
    ) -> Result<ParsedFields, PredictError> {
        if let Some(unknown) = fields.keys().find(|key| !signature.has_output(key)) {
            return Err(PredictError::UnknownOutputField(unknown.clone()));
        }
        Ok(signature
            .output_names()
            .filter_map(|name| fields.shift_remove_entry(name))
            .collect())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Values in declared output order.
    pub fn fields(&self) -> &ParsedFields {
        &self.fields
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Candidates beyond the primary one, in the order the model returned them.
    pub fn completions(&self) -> &[ParsedFields] {
        &self.completions
    }

    /// Deserializes one raw value into `T`. Plain text that isn't valid JSON
    /// is offered to `T` as a JSON string.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, PredictError> {
        let raw = self
            .get(name)
            .ok_or_else(|| PredictError::FieldNotFound(name.to_string()))?;
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        serde_json::from_value(value).map_err(|e| PredictError::Coercion {
            field: name.to_string(),
            expected: std::any::type_name::<T>().to_string(),
            reason: e.to_string(),
        })
    }

    /// Converts every value according to the type its field declares.
    pub fn coerce(
        &self,
        signature: &Signature,
    ) -> Result<serde_json::Map<String, FieldValue>, PredictError> {
        let mut typed = serde_json::Map::new();
        for field in signature.output_fields() {
            if let Some(raw) = self.fields.get(&field.name) {
                typed.insert(field.name.clone(), coerce_value(&field.name, &field.field_type, raw)?);
            }
        }
        Ok(typed)
    }

    /// The record as a demo (outputs only), ready to be merged with inputs.
    pub fn to_demo(&self) -> Demo {
        Demo::from_pairs(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

impl Index<&str> for Prediction {
    type Output = str;

    fn index(&self, name: &str) -> &Self::Output {
        match self.fields.get(name) {
            Some(value) => value.as_str(),
            None => panic!("prediction has no field '{name}'"),
        }
    }
}

fn coerce_value(name: &str, field_type: &FieldType, raw: &str) -> Result<FieldValue, PredictError> {
    let fail = |reason: String| PredictError::Coercion {
        field: name.to_string(),
        expected: field_type.to_string(),
        reason,
    };
    let text = raw.trim();
    match field_type {
        FieldType::String => Ok(Value::String(raw.to_string())),
        FieldType::Number => {
            let n: f64 = text.parse().map_err(|e: std::num::ParseFloatError| fail(e.to_string()))?;
            serde_json::Number::from_f64(n)
                .map(Value::Number)
                .ok_or_else(|| fail(format!("'{text}' is not a finite number")))
        }
        FieldType::Integer => text
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| fail(e.to_string())),
        FieldType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(Value::Bool(true)),
            "false" | "no" => Ok(Value::Bool(false)),
            other => Err(fail(format!("'{other}' is not a boolean"))),
        },
        FieldType::Structured => serde_json::from_str(text).map_err(|e| fail(e.to_string())),
    }
}
