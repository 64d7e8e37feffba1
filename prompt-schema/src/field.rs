//! Field and validator definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value type accepted by a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 text.
    String,
    /// Whole number.
    Integer,
    /// Any number; integers are accepted.
    Float,
    /// `true` or `false`.
    Boolean,
    /// Array, optionally typed via `item_type` or `item_schema`.
    List,
    /// Object, optionally described by `nested_schema`.
    Dict,
    /// Scalar restricted by an `enum` validator.
    Enum,
    /// Anything.
    Any,
}

impl FieldType {
    /// Returns the lowercase name used in definitions and diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Enum => "enum",
            Self::Any => "any",
        }
    }

    /// Returns `true` if `value` has this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Dict => value.is_object(),
            Self::Enum => !value.is_array() && !value.is_object(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single constraint attached to a field.
///
/// Length and range bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Validator {
    /// Minimum length of a string (in characters), list, or object.
    MinLength {
        /// Inclusive lower bound.
        #[serde(alias = "min_length")]
        min_value: usize,
    },
    /// Maximum length of a string, list, or object.
    MaxLength {
        /// Inclusive upper bound.
        #[serde(alias = "max_length")]
        max_value: usize,
    },
    /// Length within optional bounds.
    Length {
        /// Inclusive lower bound.
        #[serde(default, alias = "min_length")]
        min_value: Option<usize>,
        /// Inclusive upper bound.
        #[serde(default, alias = "max_length")]
        max_value: Option<usize>,
    },
    /// Numeric value within optional bounds.
    Range {
        /// Inclusive lower bound.
        #[serde(default)]
        min_value: Option<f64>,
        /// Inclusive upper bound.
        #[serde(default)]
        max_value: Option<f64>,
    },
    /// String matching a regular expression. Patterns without `^`/`$` anchors
    /// are matched against the whole string.
    Regex {
        /// Pattern source.
        pattern: String,
    },
    /// Membership in a fixed set of values.
    Enum {
        /// Permitted values.
        #[serde(alias = "values")]
        allowed_values: Vec<Value>,
    },
    /// Plausible e-mail address.
    Email,
    /// `http` or `https` URL.
    Url,
    /// Hyphenated or simple UUID.
    Uuid,
    /// Calendar date in `YYYY-MM-DD` form.
    Date,
    /// RFC 3339 timestamp.
    Datetime,
}

impl Validator {
    /// Inclusive numeric range.
    #[must_use]
    pub const fn range(min: f64, max: f64) -> Self {
        Self::Range {
            min_value: Some(min),
            max_value: Some(max),
        }
    }

    /// Inclusive length range.
    #[must_use]
    pub const fn length(min: usize, max: usize) -> Self {
        Self::Length {
            min_value: Some(min),
            max_value: Some(max),
        }
    }

    /// Regular expression constraint.
    #[must_use]
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex {
            pattern: pattern.into(),
        }
    }

    /// Enumeration constraint.
    #[must_use]
    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Enum {
            allowed_values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Compact constraint label used in violations and descriptions.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::MinLength { min_value } => format!("min_length[{min_value}]"),
            Self::MaxLength { max_value } => format!("max_length[{max_value}]"),
            Self::Length {
                min_value,
                max_value,
            } => format!(
                "length[{},{}]",
                bound(min_value.map(|n| n.to_string())),
                bound(max_value.map(|n| n.to_string()))
            ),
            Self::Range {
                min_value,
                max_value,
            } => format!(
                "range[{},{}]",
                bound(min_value.map(format_number)),
                bound(max_value.map(format_number))
            ),
            Self::Regex { pattern } => format!("regex[{pattern}]"),
            Self::Enum { allowed_values } => format!(
                "enum[{}]",
                allowed_values
                    .iter()
                    .map(|value| match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Self::Email => "email".to_owned(),
            Self::Url => "url".to_owned(),
            Self::Uuid => "uuid".to_owned(),
            Self::Date => "date".to_owned(),
            Self::Datetime => "datetime".to_owned(),
        }
    }
}

fn bound(value: Option<String>) -> String {
    value.unwrap_or_else(|| "*".to_owned())
}

/// Formats a bound without a trailing `.0` when it is integral.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

const fn default_required() -> bool {
    true
}

/// A named field within a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name, `[A-Za-z0-9_-]+`.
    pub name: String,
    /// Accepted value type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field must be present after defaults are applied.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Whether `null` is an acceptable value.
    #[serde(default)]
    pub nullable: bool,
    /// Value substituted when the field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Free-form description surfaced in generated instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Constraints checked in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    /// Element type for `list` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<FieldType>,
    /// Named schema every element of a `list` field must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_schema: Option<String>,
    /// Named schema a `dict` field must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_schema: Option<String>,
}

impl Field {
    /// Creates a required, non-nullable field.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            nullable: false,
            default: None,
            description: None,
            validators: Vec::new(),
            item_type: None,
            item_schema: None,
            nested_schema: None,
        }
    }

    /// Marks the field optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Allows `null`.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Sets the element type of a list field.
    #[must_use]
    pub fn with_item_type(mut self, item_type: FieldType) -> Self {
        self.item_type = Some(item_type);
        self
    }

    /// Sets the element schema of a list field.
    #[must_use]
    pub fn with_item_schema(mut self, schema: impl Into<String>) -> Self {
        self.item_schema = Some(schema.into());
        self
    }

    /// Sets the schema of a dict field.
    #[must_use]
    pub fn with_nested_schema(mut self, schema: impl Into<String>) -> Self {
        self.nested_schema = Some(schema.into());
        self
    }
}
