//! Schema model and definition checks.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::field::{Field, FieldType, Validator};

const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";

fn default_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_owned()
}

/// Serialized shape of a schema definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaDocument {
    name: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    strict: bool,
    #[serde(default)]
    allow_extra: bool,
    fields: Vec<Field>,
}

/// Declarative validation contract: an ordered list of uniquely named fields.
///
/// Regular expressions are compiled once when the schema is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SchemaDocument", into = "SchemaDocument")]
pub struct Schema {
    name: String,
    version: String,
    description: Option<String>,
    strict: bool,
    allow_extra: bool,
    fields: Vec<Field>,
    patterns: HashMap<String, Regex>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.description == other.description
            && self.strict == other.strict
            && self.allow_extra == other.allow_extra
            && self.fields == other.fields
    }
}

impl Schema {
    /// Returns a builder for a schema named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema version label.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether unknown keys are reported as violations.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Whether unknown keys are carried through to the validated value.
    #[must_use]
    pub const fn allows_extra(&self) -> bool {
        self.allow_extra
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Names of schemas referenced through `item_schema` or `nested_schema`.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().flat_map(|field| {
            field
                .item_schema
                .as_deref()
                .into_iter()
                .chain(field.nested_schema.as_deref())
        })
    }

    pub(crate) fn pattern(&self, source: &str) -> Option<&Regex> {
        self.patterns.get(source)
    }

    fn from_document(document: SchemaDocument) -> SchemaResult<Self> {
        let SchemaDocument {
            name,
            version,
            description,
            strict,
            allow_extra,
            fields,
        } = document;

        if !is_name(&name) {
            return Err(SchemaError::invalid(
                &name,
                "schema names must be non-empty and use only letters, digits, `_` or `-`",
            ));
        }
        if strict && allow_extra {
            return Err(SchemaError::invalid(
                &name,
                "`strict` and `allow_extra` are mutually exclusive",
            ));
        }

        let mut seen = HashSet::new();
        let mut patterns = HashMap::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::invalid(
                    &name,
                    format!("duplicate field `{}`", field.name),
                ));
            }
            check_field(&name, field, &mut patterns)?;
        }

        Ok(Self {
            name,
            version,
            description,
            strict,
            allow_extra,
            fields,
            patterns,
        })
    }
}

fn check_field(
    schema: &str,
    field: &Field,
    patterns: &mut HashMap<String, Regex>,
) -> SchemaResult<()> {
    let fail = |reason: String| Err(SchemaError::invalid(schema, reason));
    let name = &field.name;

    if !is_name(name) {
        return fail(format!(
            "field name `{name}` must use only letters, digits, `_` or `-`"
        ));
    }
    if !field.required && field.default.is_none() && !field.nullable {
        return fail(format!(
            "optional field `{name}` needs a default or must be nullable"
        ));
    }
    if field.field_type == FieldType::List
        && field.item_type.is_none()
        && field.item_schema.is_none()
    {
        return fail(format!(
            "list field `{name}` needs an `item_type` or `item_schema`"
        ));
    }
    if field.field_type == FieldType::Enum
        && !field
            .validators
            .iter()
            .any(|validator| matches!(validator, Validator::Enum { .. }))
    {
        return fail(format!("enum field `{name}` needs an `enum` validator"));
    }
    if field.item_schema.is_some() && field.field_type != FieldType::List {
        return fail(format!("`item_schema` on non-list field `{name}`"));
    }
    if field.nested_schema.is_some() && field.field_type != FieldType::Dict {
        return fail(format!("`nested_schema` on non-dict field `{name}`"));
    }

    for validator in &field.validators {
        match validator {
            Validator::Range {
                min_value,
                max_value,
            } => {
                if min_value.is_none() && max_value.is_none() {
                    return fail(format!("range on `{name}` needs at least one bound"));
                }
                if let (Some(min), Some(max)) = (min_value, max_value)
                    && min > max
                {
                    return fail(format!("range on `{name}` has min greater than max"));
                }
            }
            Validator::Length {
                min_value: Some(min),
                max_value: Some(max),
            } if min > max => {
                return fail(format!("length on `{name}` has min greater than max"));
            }
            Validator::Enum { allowed_values } if allowed_values.is_empty() => {
                return fail(format!("enum on `{name}` has no allowed values"));
            }
            Validator::Regex { pattern } => {
                let regex = Regex::new(&anchored(pattern)).map_err(|err| {
                    SchemaError::invalid(schema, format!("regex on `{name}` is invalid: {err}"))
                })?;
                patterns.insert(pattern.clone(), regex);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Wraps patterns lacking explicit anchors so they match the entire string.
fn anchored(pattern: &str) -> String {
    let declares_anchor = pattern.starts_with('^')
        || pattern.starts_with("\\A")
        || pattern.ends_with('$')
        || pattern.ends_with("\\z");
    if declares_anchor {
        pattern.to_owned()
    } else {
        format!("^(?:{pattern})$")
    }
}

fn is_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

impl TryFrom<SchemaDocument> for Schema {
    type Error = SchemaError;

    fn try_from(document: SchemaDocument) -> SchemaResult<Self> {
        Self::from_document(document)
    }
}

impl From<Schema> for SchemaDocument {
    fn from(schema: Schema) -> Self {
        Self {
            name: schema.name,
            version: schema.version,
            description: schema.description,
            strict: schema.strict,
            allow_extra: schema.allow_extra,
            fields: schema.fields,
        }
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    document: SchemaDocument,
}

impl SchemaBuilder {
    /// Starts a schema named `name` at version `1.0.0`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            document: SchemaDocument {
                name: name.into(),
                version: default_version(),
                description: None,
                strict: false,
                allow_extra: false,
                fields: Vec::new(),
            },
        }
    }

    /// Sets the version label.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.document.version = version.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.document.description = Some(description.into());
        self
    }

    /// Reject unknown keys.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.document.strict = strict;
        self
    }

    /// Carry unknown keys through to the validated value.
    #[must_use]
    pub fn allow_extra(mut self, allow_extra: bool) -> Self {
        self.document.allow_extra = allow_extra;
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.document.fields.push(field);
        self
    }

    /// Checks the definition and builds the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidSchema`] for bad names, duplicate fields,
    /// optional fields without default or nullability, untyped lists, enum
    /// fields without an `enum` validator, inverted bounds, invalid regular
    /// expressions, or `strict` combined with `allow_extra`.
    pub fn build(self) -> SchemaResult<Schema> {
        Schema::from_document(self.document)
    }
}
