//! Logic-less prompt template engine.
//!
//! Templates interpolate values from a JSON object with `{{path}}`, branch with
//! `{{#if}}`/`{{#unless}}`, iterate with `{{#each}}`, and include named partials
//! with `{{> name}}`. There are no formatting filters: callers shape values
//! before handing them to the renderer. No escaping is applied.

#![warn(missing_docs, clippy::pedantic)]

mod cache;
mod engine;
mod error;
mod parser;
mod render;

/// Variable mapping handed to the renderer.
pub type Variables = serde_json::Map<String, serde_json::Value>;

pub use cache::{TemplateCache, TemplateCacheStats};
pub use engine::{TemplateConfig, TemplateEngine, extract_variables};
pub use error::{TemplateError, TemplateResult};
pub use parser::{CompiledTemplate, compile};
pub use render::Partials;
