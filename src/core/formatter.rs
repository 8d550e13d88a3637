//! Pure rendering of signature metadata.
//!
//! Every function here depends only on its arguments and never fails for a
//! well-formed [`Signature`].

use crate::core::signature::{Field, FieldType, Signature};

/// Name of the marker that terminates a structured response.
pub const COMPLETED: &str = "completed";

/// Heading placed before the structural template.
const STRUCTURE_PREAMBLE: &str =
    "All interactions will be structured in the following way, with the appropriate values filled in.";

/// The delimiter that introduces a field: `[[ ## name ## ]]`.
pub fn field_marker(name: &str) -> String {
    format!("[[ ## {name} ## ]]")
}

/// `[[ ## completed ## ]]`
pub fn completed_marker() -> String {
    field_marker(COMPLETED)
}

/// True for descriptions that carry no information: empty, or a bare
/// placeholder such as `${answer}`.
pub fn is_placeholder(description: &str) -> bool {
    let trimmed = description.trim();
    trimmed.is_empty() || (trimmed.starts_with("${") && trimmed.ends_with('}'))
}

/// Numbered list of fields, one per line:
/// ``1. `question` (string): The user's question``
pub fn field_list(fields: &[Field]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        out.push_str(&format!("{}. `{}` ({})", i + 1, field.name, field.field_type));
        if !is_placeholder(&field.description) {
            out.push_str(&format!(": {}", field.description.trim()));
        }
        out.push('\n');
    }
    out
}

pub fn input_descriptions(signature: &Signature) -> String {
    field_list(signature.input_fields())
}

pub fn output_descriptions(signature: &Signature) -> String {
    field_list(signature.output_fields())
}

/// Both numbered lists under their headings.
pub fn field_descriptions(signature: &Signature) -> String {
    format!(
        "Your input fields are:\n{}\nYour output fields are:\n{}",
        input_descriptions(signature),
        output_descriptions(signature)
    )
}

/// Extra guidance for fields that are not plain strings.
pub fn type_note(field_type: &FieldType) -> Option<String> {
    match field_type {
        FieldType::String => None,
        FieldType::Structured => {
            Some("must be formatted as a valid JSON value".to_string())
        }
        other => Some(format!("must be formatted as a valid {other}")),
    }
}

/// Every field, inputs then outputs, as `marker` + `{placeholder}`,
/// terminated by the completion marker.
pub fn structural_template(signature: &Signature) -> String {
    let mut out = format!("{STRUCTURE_PREAMBLE}\n\n");
    for field in signature
        .input_fields()
        .iter()
        .chain(signature.output_fields())
    {
        out.push_str(&field_marker(&field.name));
        out.push('\n');
        out.push_str(&format!("{{{}}}", field.name));
        if let Some(note) = type_note(&field.field_type) {
            out.push_str(&format!("        # note: the value you produce {note}"));
        }
        out.push_str("\n\n");
    }
    out.push_str(&completed_marker());
    out.push('\n');
    out
}

/// The objective paragraph. Empty instructions fall back to a sentence
/// naming the fields.
pub fn task_description(signature: &Signature) -> String {
    let instructions = signature.instruction().trim();
    let objective = if instructions.is_empty() {
        default_instructions(signature)
    } else {
        instructions.to_string()
    };
    format!("In adhering to this structure, your objective is: \n        {objective}")
}

pub fn default_instructions(signature: &Signature) -> String {
    let quote = |names: Vec<&str>| {
        names
            .into_iter()
            .map(|n| format!("`{n}`"))
            .collect::<Vec<String>>()
            .join(", ")
    };
    format!(
        "Given the fields {}, produce the fields {}.",
        quote(signature.input_names().collect()),
        quote(signature.output_names().collect())
    )
}

/// The closing instruction of the final user turn: which output to start
/// with, which follow, and the completion marker.
pub fn output_request(signature: &Signature) -> String {
    let hint = |field: &Field| {
        type_note(&field.field_type)
            .map(|note| format!(" ({note})"))
            .unwrap_or_default()
    };

    let mut fields = signature.output_fields().iter();
    let mut request = String::from("Respond with the corresponding output fields");
    if let Some(first) = fields.next() {
        request.push_str(&format!(
            ", starting with the field `{}`{},",
            field_marker(&first.name),
            hint(first)
        ));
    }
    for field in fields {
        request.push_str(&format!(" then `{}`{},", field_marker(&field.name), hint(field)));
    }
    request.push_str(&format!(
        " and then ending with the marker for `{}`.",
        completed_marker()
    ));
    request
}
