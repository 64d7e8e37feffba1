//! Extension-based YAML/JSON document decoding shared by settings and the loader.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::{ConfigError, ConfigResult};

/// Serialisation formats accepted for configuration and definition files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.yaml` or `.yml`.
    Yaml,
    /// `.json`.
    Json,
}

impl DocumentFormat {
    /// Infers the format from the file extension, case-insensitively.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub(crate) fn decode<T: DeserializeOwned>(self, text: &str, path: &Path) -> ConfigResult<T> {
        let parsed = match self {
            Self::Yaml => serde_yaml::from_str(text).map_err(|err| err.to_string()),
            Self::Json => serde_json::from_str(text).map_err(|err| err.to_string()),
        };
        parsed.map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }
}

pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let format = DocumentFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let text = std::fs::read_to_string(path).map_err(|source| io_error(path, source))?;
    format.decode(&text, path)
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: PathBuf::from(path),
        source,
    }
}
