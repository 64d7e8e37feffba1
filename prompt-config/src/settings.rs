//! Typed manager configuration.
//!
//! Every section and field has a default, so an empty document (or no
//! document at all) yields a working in-memory configuration. Unknown keys
//! are ignored for forward compatibility.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use prompt_primitives::BumpLevel;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::format::{DocumentFormat, read_document};

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "PROMPTKIT_";

const HISTORY_FILE: &str = "history.jsonl";
const PROMPTS_DIR: &str = "prompts";

/// Top-level configuration consumed by the prompt manager builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Template engine settings.
    pub template: TemplateSettings,
    /// Render pipeline settings.
    pub render: RenderSettings,
    /// Version history settings.
    pub versioning: VersioningSettings,
    /// Persistence settings.
    pub storage: StorageSettings,
}

/// Template engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Fail renders on missing variables and partials.
    pub strict: bool,
    /// Maximum partial nesting depth.
    pub max_partial_depth: usize,
    /// Compiled-template cache capacity.
    pub cache_capacity: usize,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            strict: false,
            max_partial_depth: 8,
            cache_capacity: 512,
        }
    }
}

/// Render pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Append `# Output Requirements` when a prompt declares an output schema.
    pub inject_output_instructions: bool,
    /// Prepend `# Input Requirements` when a prompt declares an input schema.
    pub inject_input_description: bool,
    /// Cache rendered output.
    pub cache_enabled: bool,
    /// Maximum number of cached renders.
    pub cache_capacity: usize,
    /// Lifetime of cached renders; `None` keeps them until evicted.
    pub cache_ttl_secs: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            inject_output_instructions: true,
            inject_input_description: false,
            cache_enabled: false,
            cache_capacity: 1000,
            cache_ttl_secs: None,
        }
    }
}

/// Version history settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningSettings {
    /// Bump level used by `update_prompt(.., bump_version = true, ..)`.
    pub default_bump: BumpLevel,
    /// Author recorded on history entries.
    pub created_by: Option<String>,
}

/// Persistence backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local maps; nothing survives a restart.
    #[default]
    Memory,
    /// JSON files plus a JSON-lines history journal under `storage.path`.
    File,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(format!("unknown storage backend `{other}`")),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Backend kind.
    pub backend: StorageBackend,
    /// Root directory of the file backend.
    pub path: Option<PathBuf>,
}

impl StorageSettings {
    /// Directory holding current prompt records, if the file backend is configured.
    #[must_use]
    pub fn prompts_dir(&self) -> Option<PathBuf> {
        self.file_root().map(|root| root.join(PROMPTS_DIR))
    }

    /// Path of the history journal, if the file backend is configured.
    #[must_use]
    pub fn history_path(&self) -> Option<PathBuf> {
        self.file_root().map(|root| root.join(HISTORY_FILE))
    }

    fn file_root(&self) -> Option<&Path> {
        match self.backend {
            StorageBackend::File => self.path.as_deref(),
            StorageBackend::Memory => None,
        }
    }
}

impl ManagerConfig {
    /// Loads a configuration file (YAML or JSON, by extension) and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or the
    /// resulting configuration is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let config: Self = read_document(path)?;
        config.validate()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parses a configuration from text in the given format and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_str_with(text: &str, format: DocumentFormat) -> ConfigResult<Self> {
        let config: Self = format.decode(text, Path::new("<inline>"))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `PROMPTKIT_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// See [`ManagerConfig::apply_overrides`].
    pub fn with_env_overrides(mut self) -> ConfigResult<Self> {
        self.apply_overrides(std::env::vars())?;
        Ok(self)
    }

    /// Applies `PROMPTKIT_*` overrides from an explicit set of variables.
    ///
    /// Variables without the prefix are ignored; unrecognised prefixed names
    /// are logged and ignored. The configuration is re-validated afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] when a value does not parse,
    /// or [`ConfigError::Invalid`] when the result fails validation.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let applied = self.apply_one(name, value).map_err(|reason| {
                ConfigError::InvalidOverride {
                    key: key.to_owned(),
                    value: value.to_owned(),
                    reason,
                }
            })?;
            if applied {
                debug!(key, "configuration override applied");
            } else {
                warn!(key, "ignoring unrecognised configuration override");
            }
        }
        self.validate()
    }

    fn apply_one(&mut self, name: &str, value: &str) -> Result<bool, String> {
        match name {
            "TEMPLATE_STRICT" => self.template.strict = parse_bool(value)?,
            "TEMPLATE_MAX_PARTIAL_DEPTH" => self.template.max_partial_depth = parse(value)?,
            "TEMPLATE_CACHE_CAPACITY" => self.template.cache_capacity = parse(value)?,
            "RENDER_INJECT_OUTPUT_INSTRUCTIONS" => {
                self.render.inject_output_instructions = parse_bool(value)?;
            }
            "RENDER_INJECT_INPUT_DESCRIPTION" => {
                self.render.inject_input_description = parse_bool(value)?;
            }
            "RENDER_CACHE_ENABLED" => self.render.cache_enabled = parse_bool(value)?,
            "RENDER_CACHE_CAPACITY" => self.render.cache_capacity = parse(value)?,
            "RENDER_CACHE_TTL_SECS" => {
                self.render.cache_ttl_secs = if value.trim().is_empty() {
                    None
                } else {
                    Some(parse(value)?)
                };
            }
            "VERSIONING_DEFAULT_BUMP" => {
                self.versioning.default_bump =
                    value.parse().map_err(|err: prompt_primitives::Error| err.to_string())?;
            }
            "VERSIONING_CREATED_BY" => {
                self.versioning.created_by = Some(value.to_owned()).filter(|v| !v.is_empty());
            }
            "STORAGE_BACKEND" => self.storage.backend = value.parse()?,
            "STORAGE_PATH" => self.storage.path = Some(PathBuf::from(value)),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Checks value ranges and cross-field requirements.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending setting.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.template.max_partial_depth == 0 {
            return Err(ConfigError::invalid(
                "template.max_partial_depth",
                "must be at least 1",
            ));
        }
        if self.template.cache_capacity == 0 {
            return Err(ConfigError::invalid(
                "template.cache_capacity",
                "must be at least 1",
            ));
        }
        if self.render.cache_enabled && self.render.cache_capacity == 0 {
            return Err(ConfigError::invalid(
                "render.cache_capacity",
                "must be at least 1 when the render cache is enabled",
            ));
        }
        if self.render.cache_ttl_secs == Some(0) {
            return Err(ConfigError::invalid(
                "render.cache_ttl_secs",
                "must be positive; omit it to disable expiry",
            ));
        }
        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            return Err(ConfigError::invalid(
                "storage.path",
                "the file backend requires a root directory",
            ));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| err.to_string())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("`{other}` is not a boolean")),
    }
}
