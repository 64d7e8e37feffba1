//! Depth-first validation with aggregated diagnostics.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{SchemaError, SchemaResult, Violation};
use crate::field::{Field, FieldType, Validator, format_number};
use crate::schema::Schema;

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").ok());
static URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/?#]+\.[^\s/?#]+(?:[/?#]\S*)?$|^https?://localhost(?::\d+)?(?:[/?#]\S*)?$").ok());

/// Resolves schema names referenced by `item_schema` and `nested_schema`.
pub trait SchemaLookup {
    /// Returns the schema registered as `name`.
    fn lookup(&self, name: &str) -> Option<Arc<Schema>>;
}

/// Lookup that knows no schemas; nested references are reported as violations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchemas;

impl SchemaLookup for NoSchemas {
    fn lookup(&self, _name: &str) -> Option<Arc<Schema>> {
        None
    }
}

impl Schema {
    /// Validates `value` without resolving nested schema references.
    ///
    /// # Errors
    ///
    /// See [`validate`].
    pub fn validate(&self, value: &Value) -> SchemaResult<Value> {
        validate(self, value, &NoSchemas)
    }
}

/// Validates `value` against `schema`, returning the value with defaults
/// applied and, unless `allow_extra` is set, undeclared keys removed.
///
/// Every field is checked in one pass. A field path contributes at most one
/// violation: the first failing check among presence, nullability, type, and
/// then validators in declaration order.
///
/// # Errors
///
/// Returns [`SchemaError::Validation`] listing every violation found.
pub fn validate(schema: &Schema, value: &Value, lookup: &dyn SchemaLookup) -> SchemaResult<Value> {
    let mut violations = Vec::new();
    let validated = match value.as_object() {
        Some(object) => Value::Object(validate_object(schema, object, "", lookup, &mut violations)),
        None => {
            violations.push(Violation::new(
                "$",
                "type[dict]",
                value.clone(),
                "expected a JSON object",
            ));
            Value::Null
        }
    };

    if violations.is_empty() {
        Ok(validated)
    } else {
        tracing::debug!(
            schema = schema.name(),
            violations = violations.len(),
            "schema validation failed"
        );
        Err(SchemaError::Validation {
            schema: schema.name().to_owned(),
            violations,
        })
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_object(
    schema: &Schema,
    object: &Map<String, Value>,
    prefix: &str,
    lookup: &dyn SchemaLookup,
    violations: &mut Vec<Violation>,
) -> Map<String, Value> {
    let mut output = Map::new();

    for field in schema.fields() {
        let path = join(prefix, &field.name);
        let resolved = object.get(&field.name).or(field.default.as_ref());
        match resolved {
            None if field.required => violations.push(Violation::new(
                path,
                "required",
                Value::Null,
                "field is required",
            )),
            None => {}
            Some(value) => {
                if let Some(checked) = validate_field(schema, field, value, &path, lookup, violations) {
                    output.insert(field.name.clone(), checked);
                }
            }
        }
    }

    for (key, value) in object {
        if schema.field(key).is_some() {
            continue;
        }
        if schema.is_strict() {
            violations.push(Violation::new(
                join(prefix, key),
                "unknown_field",
                value.clone(),
                "field is not declared by the schema",
            ));
        } else if schema.allows_extra() {
            output.insert(key.clone(), value.clone());
        }
    }

    output
}

/// Validates one resolved field value. Returns the value to keep, or `None`
/// when a violation was recorded for this path.
fn validate_field(
    schema: &Schema,
    field: &Field,
    value: &Value,
    path: &str,
    lookup: &dyn SchemaLookup,
    violations: &mut Vec<Violation>,
) -> Option<Value> {
    if value.is_null() {
        if field.nullable {
            return Some(Value::Null);
        }
        violations.push(Violation::new(path, "not_null", Value::Null, "value must not be null"));
        return None;
    }

    if !field.field_type.accepts(value) {
        violations.push(Violation::new(
            path,
            format!("type[{}]", field.field_type),
            value.clone(),
            format!("expected {}", field.field_type),
        ));
        return None;
    }

    for validator in &field.validators {
        if let Some(message) = check(schema, validator, value) {
            violations.push(Violation::new(path, validator.label(), value.clone(), message));
            return None;
        }
    }

    match (field.field_type, value) {
        (FieldType::List, Value::Array(items)) => {
            Some(Value::Array(validate_items(field, items, path, lookup, violations)))
        }
        (FieldType::Dict, Value::Object(object)) => match &field.nested_schema {
            Some(name) => match lookup.lookup(name) {
                Some(nested) => Some(Value::Object(validate_object(&nested, object, path, lookup, violations))),
                None => {
                    violations.push(unknown_reference(path, name, value));
                    None
                }
            },
            None => Some(value.clone()),
        },
        _ => Some(value.clone()),
    }
}

fn validate_items(
    field: &Field,
    items: &[Value],
    path: &str,
    lookup: &dyn SchemaLookup,
    violations: &mut Vec<Violation>,
) -> Vec<Value> {
    let item_schema = match &field.item_schema {
        Some(name) => match lookup.lookup(name) {
            Some(schema) => Some(schema),
            None => {
                violations.push(unknown_reference(path, name, &Value::Array(items.to_vec())));
                return items.to_vec();
            }
        },
        None => None,
    };

    let mut output = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let item_path = format!("{path}[{index}]");
        if let Some(schema) = &item_schema {
            match item.as_object() {
                Some(object) => {
                    output.push(Value::Object(validate_object(schema, object, &item_path, lookup, violations)));
                }
                None => violations.push(Violation::new(
                    item_path,
                    "type[dict]",
                    item.clone(),
                    "expected dict",
                )),
            }
        } else if let Some(item_type) = field.item_type
            && !item_type.accepts(item)
        {
            violations.push(Violation::new(
                item_path,
                format!("type[{item_type}]"),
                item.clone(),
                format!("expected {item_type}"),
            ));
        } else {
            output.push(item.clone());
        }
    }
    output
}

fn unknown_reference(path: &str, name: &str, value: &Value) -> Violation {
    Violation::new(
        path,
        format!("schema[{name}]"),
        value.clone(),
        format!("references unknown schema `{name}`"),
    )
}

/// Runs one validator. Returns a message when the check fails.
fn check(schema: &Schema, validator: &Validator, value: &Value) -> Option<String> {
    match validator {
        Validator::MinLength { min_value } => check_length(value, Some(*min_value), None),
        Validator::MaxLength { max_value } => check_length(value, None, Some(*max_value)),
        Validator::Length {
            min_value,
            max_value,
        } => check_length(value, *min_value, *max_value),
        Validator::Range {
            min_value,
            max_value,
        } => {
            let Some(number) = value.as_f64() else {
                return Some("range applies only to numbers".to_owned());
            };
            let below = min_value.is_some_and(|min| number < min);
            let above = max_value.is_some_and(|max| number > max);
            (below || above).then(|| {
                format!(
                    "{} is outside {}",
                    format_number(number),
                    validator.label()
                )
            })
        }
        Validator::Regex { pattern } => {
            let Some(text) = value.as_str() else {
                return Some("pattern applies only to strings".to_owned());
            };
            match schema.pattern(pattern) {
                Some(regex) if regex.is_match(text) => None,
                Some(_) => Some(format!("does not match pattern `{pattern}`")),
                None => Some(format!("pattern `{pattern}` was not compiled")),
            }
        }
        Validator::Enum { allowed_values } => (!allowed_values.contains(value))
            .then(|| format!("must be one of {}", validator.label())),
        Validator::Email => check_str(value, "an e-mail address", |text| {
            EMAIL.as_ref().is_some_and(|re| re.is_match(text))
        }),
        Validator::Url => check_str(value, "an http(s) URL", |text| {
            URL.as_ref().is_some_and(|re| re.is_match(text))
        }),
        Validator::Uuid => check_str(value, "a UUID", |text| Uuid::parse_str(text).is_ok()),
        Validator::Date => check_str(value, "a YYYY-MM-DD date", |text| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        }),
        Validator::Datetime => check_str(value, "an RFC 3339 timestamp", |text| {
            DateTime::parse_from_rfc3339(text).is_ok()
        }),
    }
}

fn check_length(value: &Value, min: Option<usize>, max: Option<usize>) -> Option<String> {
    let len = match value {
        Value::String(text) => text.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => return Some("length applies only to strings, lists and dicts".to_owned()),
    };
    if let Some(min) = min
        && len < min
    {
        return Some(format!("length {len} is below minimum {min}"));
    }
    if let Some(max) = max
        && len > max
    {
        return Some(format!("length {len} is above maximum {max}"));
    }
    None
}

fn check_str(value: &Value, expected: &str, predicate: impl Fn(&str) -> bool) -> Option<String> {
    match value.as_str() {
        Some(text) if predicate(text) => None,
        _ => Some(format!("must be {expected}")),
    }
}
