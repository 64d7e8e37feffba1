//! Versioned, schema-validated prompt management for LLM applications.
//!
//! This crate bundles the component crates behind feature flags. Most users
//! only need [`PromptManager`]:
//!
//! ```no_run
//! use promptkit::{Prompt, PromptId, PromptManager};
//!
//! # async fn demo() -> Result<(), promptkit::PromptError> {
//! let manager = PromptManager::builder().build()?;
//! manager
//!     .create_prompt(Prompt::builder("greeting").text("Hello {{name}}!").build()?, None)
//!     .await?;
//!
//! let vars = serde_json::json!({"name": "Alice"}).as_object().cloned().unwrap_or_default();
//! let text = manager.render(&PromptId::new("greeting")?, &vars, None).await?;
//! assert_eq!(text, "Hello Alice!");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, clippy::pedantic)]

/// Prompt data model.
pub use prompt_primitives as primitives;

/// Template engine.
pub use prompt_template as template;

/// Schemas and response validation.
pub use prompt_schema as schema;

/// Storage backends (enabled by `storage` feature).
#[cfg(feature = "storage")]
pub use prompt_storage as storage;

/// Version history backends (enabled by `versioning` feature).
#[cfg(feature = "versioning")]
pub use prompt_versioning as versioning;

/// Configuration and definition loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use prompt_config as config;

/// Manager, registry, and execution bridge (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use prompt_kernel as kernel;

/// Tracing setup and statistics (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use prompt_telemetry as telemetry;

pub use prompt_primitives::{
    BumpLevel, Message, Prompt, PromptFilter, PromptFormat, PromptId, PromptStatus, PromptVersion,
    Role, Version,
};
pub use prompt_schema::{Field, FieldType, Schema, Validator, Violation};
pub use prompt_template::Variables;

#[cfg(feature = "kernel")]
pub use prompt_kernel::{
    BlockingPromptManager, ErrorKind, PromptError, PromptManager, PromptResult, RenderOptions,
    UpdateMode,
};
