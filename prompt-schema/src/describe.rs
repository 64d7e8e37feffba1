//! Textual schema descriptions for humans and language models.

use std::fmt::Write as _;

use crate::field::{Field, FieldType};
use crate::schema::Schema;

const NO_DESCRIPTION: &str = "No description";

/// Describes every field with its type, presence, and constraints.
///
/// ```text
/// Schema `user` (version 1.0.0, strict)
/// A registered user
/// - username: string, required; min_length[3], max_length[20]
/// - age: integer, optional, nullable; range[0,150]
/// ```
#[must_use]
pub fn describe(schema: &Schema) -> String {
    let mut out = format!("Schema `{}` (version {}", schema.name(), schema.version());
    if schema.is_strict() {
        out.push_str(", strict");
    }
    out.push(')');
    if let Some(description) = schema.description() {
        out.push('\n');
        out.push_str(description);
    }
    for field in schema.fields() {
        let _ = write!(out, "\n- {}: {}", field.name, type_label(field));
        out.push_str(if field.required { ", required" } else { ", optional" });
        if field.nullable {
            out.push_str(", nullable");
        }
        if let Some(default) = &field.default {
            let _ = write!(out, ", default {default}");
        }
        if !field.validators.is_empty() {
            let labels: Vec<_> = field.validators.iter().map(crate::Validator::label).collect();
            let _ = write!(out, "; {}", labels.join(", "));
        }
        if let Some(description) = &field.description {
            let _ = write!(out, " ({description})");
        }
    }
    out
}

/// Builds the `# Output Requirements` section appended to rendered prompts.
#[must_use]
pub fn output_instructions(schema: &Schema) -> String {
    let mut lines = vec![
        "# Output Requirements".to_owned(),
        String::new(),
        "You MUST respond with valid JSON matching this exact structure:".to_owned(),
        String::new(),
    ];
    if let Some(description) = schema.description() {
        lines.push(description.to_owned());
        lines.push(String::new());
    }
    lines.push("Required JSON format:".to_owned());
    lines.push("```json".to_owned());
    lines.push("{".to_owned());

    let count = schema.fields().len();
    for (index, field) in schema.fields().iter().enumerate() {
        let presence = if field.required { "required" } else { "optional" };
        let comma = if index + 1 < count { "," } else { "" };
        lines.push(format!(
            "  \"{}\": {}{comma}  // {presence} - {}",
            field.name,
            placeholder(field),
            field.description.as_deref().unwrap_or(NO_DESCRIPTION)
        ));
    }

    lines.push("}".to_owned());
    lines.push("```".to_owned());
    lines.push(String::new());
    lines.push(
        "IMPORTANT: Return ONLY the JSON object, no additional text or explanation.".to_owned(),
    );
    lines.join("\n")
}

/// Builds the `# Input Requirements` preamble listing expected variables.
#[must_use]
pub fn input_description(schema: &Schema) -> String {
    let mut lines = vec!["# Input Requirements".to_owned(), String::new()];
    if let Some(description) = schema.description() {
        lines.push(description.to_owned());
        lines.push(String::new());
    }
    lines.push("Expected input fields:".to_owned());
    for field in schema.fields() {
        lines.push(format!(
            "- {} ({}, {}): {}",
            field.name,
            field.field_type,
            if field.required { "required" } else { "optional" },
            field.description.as_deref().unwrap_or(NO_DESCRIPTION)
        ));
    }
    lines.join("\n")
}

fn type_label(field: &Field) -> String {
    match (field.field_type, field.item_type, &field.item_schema, &field.nested_schema) {
        (FieldType::List, _, Some(schema), _) => format!("list of `{schema}`"),
        (FieldType::List, Some(item), None, _) => format!("list of {item}"),
        (FieldType::Dict, _, _, Some(schema)) => format!("dict `{schema}`"),
        (other, ..) => other.to_string(),
    }
}

fn placeholder(field: &Field) -> String {
    match field.field_type {
        FieldType::String => format!("\"your {} here\"", field.name),
        FieldType::Integer => "0".to_owned(),
        FieldType::Float => "0.0".to_owned(),
        FieldType::Boolean => "true".to_owned(),
        FieldType::List => "[]".to_owned(),
        FieldType::Dict => "{}".to_owned(),
        FieldType::Enum => field
            .validators
            .iter()
            .find_map(|validator| match validator {
                crate::Validator::Enum { allowed_values } => allowed_values.first().map(ToString::to_string),
                _ => None,
            })
            .unwrap_or_else(|| "null".to_owned()),
        FieldType::Any => "null".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, Validator};

    fn review_schema() -> Schema {
        Schema::builder("review")
            .description("Sentiment verdict")
            .strict(true)
            .field(
                Field::new("sentiment", FieldType::Enum)
                    .with_validator(Validator::one_of(["positive", "negative"]))
                    .with_description("Overall tone"),
            )
            .field(Field::new("score", FieldType::Float).with_validator(Validator::range(0.0, 1.0)))
            .field(Field::new("notes", FieldType::String).optional().nullable())
            .build()
            .unwrap()
    }

    #[test]
    fn output_instructions_contain_json_skeleton() {
        let text = output_instructions(&review_schema());
        assert!(text.starts_with("# Output Requirements\n"));
        assert!(text.contains("  \"sentiment\": \"positive\",  // required - Overall tone"));
        assert!(text.contains("  \"score\": 0.0,  // required - No description"));
        assert!(text.contains("  \"notes\": \"your notes here\"  // optional - No description"));
        assert!(text.ends_with("Return ONLY the JSON object, no additional text or explanation."));
    }

    #[test]
    fn input_description_lists_fields() {
        let text = input_description(&review_schema());
        assert!(text.starts_with("# Input Requirements\n\nSentiment verdict\n"));
        assert!(text.contains("- notes (string, optional): No description"));
    }

    #[test]
    fn describe_lists_constraints() {
        let text = describe(&review_schema());
        assert!(text.starts_with("Schema `review` (version 1.0.0, strict)"));
        assert!(text.contains("- score: float, required; range[0,1]"));
        assert!(text.contains("- notes: string, optional, nullable"));
    }
}
