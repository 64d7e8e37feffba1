//! `tracing-subscriber` initialisation.

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output layout of the fmt subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-field single-line output.
    #[default]
    Full,
    /// Abbreviated single-line output.
    Compact,
    /// Multi-line human-oriented output.
    Pretty,
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. `info,prompt_kernel=debug`.
    pub default_filter: String,
    /// Output layout.
    pub format: LogFormat,
    /// Include the event target (module path).
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_owned(),
            format: LogFormat::Full,
            with_target: false,
        }
    }
}

impl TelemetryConfig {
    /// Sets the fallback filter directive.
    #[must_use]
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    /// Sets the output layout.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn filter(&self) -> anyhow::Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.default_filter)
                .with_context(|| format!("invalid log filter `{}`", self.default_filter)),
        }
    }
}

/// Installs a global fmt subscriber honouring `RUST_LOG`.
///
/// # Errors
///
/// Fails when the fallback filter does not parse or a global subscriber is
/// already installed.
pub fn init_tracing(config: &TelemetryConfig) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter()?)
        .with_target(config.with_target);
    let installed = match config.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}
