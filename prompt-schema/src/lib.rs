//! Declarative schemas for prompt variables and model responses.
//!
//! Validation walks every declared field depth-first and reports all
//! violations in a single [`SchemaError::Validation`], so callers get complete
//! diagnostics instead of the first failure only.

#![warn(missing_docs, clippy::pedantic)]

mod describe;
mod error;
mod field;
mod registry;
mod response;
mod schema;
mod validate;

pub use describe::{describe, input_description, output_instructions};
pub use error::{SchemaError, SchemaResult, Violation};
pub use field::{Field, FieldType, Validator};
pub use registry::SchemaRegistry;
pub use response::parse_response;
pub use schema::{Schema, SchemaBuilder};
pub use validate::{NoSchemas, SchemaLookup, validate};
