//! Explicitly registered format converters.
//!
//! A plugin turns a [`RenderedPrompt`] into whatever request shape a
//! downstream consumer expects. Plugins are only ever added through
//! [`PluginRegistry::register`]; nothing is discovered implicitly.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use prompt_primitives::{Prompt, PromptFormat, PromptId, Role, Version};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{PromptError, PromptResult};

/// One rendered chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    /// Author role.
    pub role: Role,
    /// Rendered content.
    pub content: String,
    /// Optional participant name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Fully rendered prompt handed to plugins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPrompt {
    /// Prompt identifier.
    pub prompt_id: PromptId,
    /// Rendered version.
    pub version: Version,
    /// Content format of the source prompt.
    pub format: PromptFormat,
    /// Flat text, identical to what `render` returns.
    pub text: String,
    /// Structured messages; a text prompt yields one user message.
    pub messages: Vec<RenderedMessage>,
    /// Output schema the response should satisfy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<String>,
}

/// Converter from rendered prompts to a consumer-specific shape.
pub trait PromptPlugin: Send + Sync {
    /// Unique registration name.
    fn name(&self) -> &str;

    /// Returns `false` for prompts this plugin cannot convert.
    fn supports(&self, _prompt: &Prompt) -> bool {
        true
    }

    /// Converts a rendered prompt.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when conversion fails.
    fn convert(&self, rendered: &RenderedPrompt) -> Result<Value, String>;
}

/// Name-keyed plugin registry.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<dyn PromptPlugin>>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin under its [`PromptPlugin::name`].
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Plugin`] if the name is already taken.
    pub fn register(&self, plugin: Arc<dyn PromptPlugin>) -> PromptResult<()> {
        let name = plugin.name().to_owned();
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        if plugins.contains_key(&name) {
            return Err(PromptError::Plugin {
                name,
                reason: "a plugin with this name is already registered".to_owned(),
            });
        }
        debug!(plugin = %name, "plugin registered");
        plugins.insert(name, plugin);
        Ok(())
    }

    /// Removes a plugin. Returns `true` if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Returns the plugin registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::PluginNotFound`] when absent.
    pub fn get(&self, name: &str) -> PromptResult<Arc<dyn PromptPlugin>> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| PromptError::PluginNotFound {
                name: name.to_owned(),
            })
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl PromptPlugin for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn convert(&self, rendered: &RenderedPrompt) -> Result<Value, String> {
            Ok(Value::String(rendered.text.clone()))
        }
    }

    #[test]
    fn registers_and_looks_up_by_name() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();
        assert_eq!(registry.names(), ["echo"]);
        assert!(registry.get("echo").is_ok());
        assert!(matches!(
            registry.register(Arc::new(Echo)),
            Err(PromptError::Plugin { .. })
        ));
        assert!(registry.unregister("echo"));
        assert!(matches!(
            registry.get("echo"),
            Err(PromptError::PluginNotFound { .. })
        ));
    }
}
