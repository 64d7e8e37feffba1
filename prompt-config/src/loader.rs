//! Declarative prompt and schema definitions.
//!
//! A definition file holds exactly one of:
//!
//! - a single prompt document (`id`, `version`, `format`, `template` or `chat_template`, ...),
//! - a list of prompts under `prompts: [...]`,
//! - a list of schemas under `schemas: [...]`.
//!
//! The loader only constructs typed values; registering them with a manager
//! is the caller's job.

use std::path::{Path, PathBuf};

use prompt_primitives::Prompt;
use prompt_schema::Schema;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::format::{DocumentFormat, io_error, read_document};

/// Prompts and schemas read from one or more definition files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionSet {
    /// Prompt definitions, in file order.
    pub prompts: Vec<Prompt>,
    /// Schema definitions, in file order.
    pub schemas: Vec<Schema>,
}

impl DefinitionSet {
    /// Returns `true` when nothing was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty() && self.schemas.is_empty()
    }

    fn extend(&mut self, other: Self) {
        self.prompts.extend(other.prompts);
        self.schemas.extend(other.schemas);
    }
}

/// Loads a file or, recursively, every `.yaml`/`.yml`/`.json` file under a directory.
///
/// Directory entries are visited in lexicographic order so load order is stable.
///
/// # Errors
///
/// Returns [`ConfigError`] for unreadable paths, malformed documents, or
/// definitions that violate a model invariant. Loading stops at the first
/// failing file.
pub fn load_definitions(path: impl AsRef<Path>) -> ConfigResult<DefinitionSet> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|source| io_error(path, source))?;
    if metadata.is_dir() {
        load_dir(path)
    } else {
        load_file(path)
    }
}

/// Loads the definitions held by a single file.
///
/// # Errors
///
/// See [`load_definitions`].
pub fn load_file(path: impl AsRef<Path>) -> ConfigResult<DefinitionSet> {
    let path = path.as_ref();
    let document: Value = read_document(path)?;
    let set = classify(document, path)?;
    debug!(
        path = %path.display(),
        prompts = set.prompts.len(),
        schemas = set.schemas.len(),
        "definitions loaded"
    );
    Ok(set)
}

fn load_dir(dir: &Path) -> ConfigResult<DefinitionSet> {
    let mut set = DefinitionSet::default();
    for path in definition_files(dir)? {
        set.extend(load_file(&path)?);
    }
    Ok(set)
}

fn definition_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)
        .map_err(|source| io_error(dir, source))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| io_error(dir, source))?;
    entries.sort();

    let mut files = Vec::new();
    for path in entries {
        if path.is_dir() {
            files.extend(definition_files(&path)?);
        } else if DocumentFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    Ok(files)
}

fn classify(document: Value, path: &Path) -> ConfigResult<DefinitionSet> {
    let Value::Object(mut map) = document else {
        return Err(definition_error(path, "top-level document must be a mapping"));
    };

    if let Some(schemas) = map.remove("schemas") {
        let schemas: Vec<Schema> = decode(schemas, path)?;
        return Ok(DefinitionSet {
            prompts: Vec::new(),
            schemas,
        });
    }
    if let Some(prompts) = map.remove("prompts") {
        let prompts: Vec<Prompt> = decode(prompts, path)?;
        return Ok(DefinitionSet {
            prompts,
            schemas: Vec::new(),
        });
    }
    let prompt: Prompt = decode(Value::Object(map), path)?;
    Ok(DefinitionSet {
        prompts: vec![prompt],
        schemas: Vec::new(),
    })
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, path: &Path) -> ConfigResult<T> {
    serde_json::from_value(value).map_err(|err| definition_error(path, err.to_string()))
}

fn definition_error(path: &Path, reason: impl Into<String>) -> ConfigError {
    ConfigError::Definition {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use prompt_primitives::PromptFormat;
    use prompt_schema::FieldType;

    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_single_yaml_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "greeting.yaml",
            "
id: greeting
version: 1.2.0
format: text
template:
  content: 'Hello {{name}}!'
  variables: [name]
metadata:
  tags: [Onboarding]
",
        );
        let set = load_file(&path).unwrap();
        assert_eq!(set.prompts.len(), 1);
        let prompt = &set.prompts[0];
        assert_eq!(prompt.id().as_str(), "greeting");
        assert_eq!(prompt.version().to_string(), "1.2.0");
        assert_eq!(prompt.format(), PromptFormat::Text);
        assert_eq!(prompt.metadata().tags, vec!["onboarding"]);
    }

    #[test]
    fn loads_schema_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "schemas.json",
            r#"{"schemas": [{
                "name": "user_input",
                "fields": [
                    {"name": "age", "type": "integer",
                     "validators": [{"type": "range", "min_value": 13, "max_value": 120}]}
                ]
            }]}"#,
        );
        let set = load_file(&path).unwrap();
        assert!(set.prompts.is_empty());
        assert_eq!(set.schemas[0].name(), "user_input");
        assert_eq!(set.schemas[0].fields()[0].field_type, FieldType::Integer);
    }

    #[test]
    fn walks_directories_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "b/second.json",
            r#"{"id": "second", "format": "text", "template": {"content": "B"}}"#,
        );
        write(
            dir.path(),
            "a.yaml",
            "prompts:\n  - {id: first, format: text, template: {content: A}}\n",
        );
        write(dir.path(), "README.md", "not a definition");

        let set = load_definitions(dir.path()).unwrap();
        let ids: Vec<_> = set.prompts.iter().map(|p| p.id().as_str()).collect();
        assert_eq!(ids, ["first", "second"]);
    }

    #[test]
    fn invariant_violations_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "bad.json",
            r#"{"id": "bad", "version": "1.0", "format": "text", "template": {"content": "x"}}"#,
        );
        match load_file(&path).unwrap_err() {
            ConfigError::Definition { path: reported, reason } => {
                assert_eq!(reported, path);
                assert!(reason.contains("1.0"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
