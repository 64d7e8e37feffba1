//! Configuration management for promptkit.
//!
//! [`ManagerConfig`] carries every tunable of the prompt manager and loads
//! from YAML or JSON with `PROMPTKIT_*` environment overrides. The
//! [`loader`] module reads declarative prompt and schema definitions.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod format;
pub mod loader;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use format::DocumentFormat;
pub use loader::{DefinitionSet, load_definitions};
pub use settings::{
    ENV_PREFIX, ManagerConfig, RenderSettings, StorageBackend, StorageSettings, TemplateSettings,
    VersioningSettings,
};
