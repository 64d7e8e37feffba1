//! Named schema registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::response::parse_response;
use crate::schema::Schema;
use crate::validate::{SchemaLookup, validate};

/// Thread-safe registry of schemas keyed by name.
///
/// The registry also resolves `item_schema`/`nested_schema` references while
/// validating.
#[derive(Default)]
pub struct SchemaRegistry {
    inner: RwLock<HashMap<String, Arc<Schema>>>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("registered", &self.names())
            .finish()
    }
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateSchema`] if the name is taken.
    pub fn register(&self, schema: Schema) -> SchemaResult<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let name = schema.name().to_owned();
        if inner.contains_key(&name) {
            return Err(SchemaError::DuplicateSchema { name });
        }
        debug!(schema = %name, fields = schema.fields().len(), "schema registered");
        inner.insert(name, Arc::new(schema));
        Ok(())
    }

    /// Registers or replaces a schema, returning the previous definition.
    pub fn replace(&self, schema: Schema) -> Option<Arc<Schema>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.insert(schema.name().to_owned(), Arc::new(schema))
    }

    /// Returns the schema registered as `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.get(name).cloned()
    }

    /// Returns the schema registered as `name` or an error.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownSchema`] when absent.
    pub fn require(&self, name: &str) -> SchemaResult<Arc<Schema>> {
        self.get(name).ok_or_else(|| SchemaError::UnknownSchema {
            name: name.to_owned(),
        })
    }

    /// Removes a schema. Returns `true` if it was registered.
    pub fn remove(&self, name: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.remove(name).is_some()
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.contains_key(name)
    }

    /// Registered schema names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = inner.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no schemas are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validates `value` against the schema registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownSchema`] or [`SchemaError::Validation`].
    pub fn validate(&self, name: &str, value: &Value) -> SchemaResult<Value> {
        let schema = self.require(name)?;
        validate(&schema, value, self)
    }

    /// Parses a raw model response and validates it against `name`.
    ///
    /// Parsing happens first, so malformed text is reported as
    /// [`SchemaError::ResponseParse`] rather than as field violations.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownSchema`], [`SchemaError::ResponseParse`],
    /// or [`SchemaError::Validation`].
    pub fn parse_and_validate(&self, name: &str, raw: &str) -> SchemaResult<Value> {
        let schema = self.require(name)?;
        let value = parse_response(raw)?;
        validate(&schema, &value, self)
    }

    /// Returns the names referenced by registered schemas that are not themselves registered.
    #[must_use]
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut dangling: Vec<_> = inner
            .values()
            .flat_map(|schema| {
                schema
                    .references()
                    .filter(|name| !inner.contains_key(*name))
                    .map(|name| (schema.name().to_owned(), name.to_owned()))
                    .collect::<Vec<_>>()
            })
            .collect();
        dangling.sort();
        dangling
    }
}

impl SchemaLookup for SchemaRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<Schema>> {
        self.get(name)
    }
}
