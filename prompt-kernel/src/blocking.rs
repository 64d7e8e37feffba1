//! Synchronous view of [`PromptManager`] for callers without a runtime.

use chrono::{DateTime, Utc};
use prompt_config::DefinitionSet;
use prompt_primitives::{Prompt, PromptFilter, PromptId, PromptVersion, Version};
use prompt_template::{TemplateCacheStats, Variables};
use serde_json::Value;

use crate::bridge::run_blocking;
use crate::error::PromptResult;
use crate::manager::{PromptManager, RenderOptions, UpdateMode};
use crate::plugins::RenderedMessage;

/// Blocking wrapper returned by [`PromptManager::blocking`].
///
/// Each call drives the async operation on a private runtime and returns
/// [`crate::PromptError::NestedScheduler`] when invoked from inside one.
/// Results and errors are identical to the async form.
#[derive(Debug, Clone, Copy)]
pub struct BlockingPromptManager<'a> {
    manager: &'a PromptManager,
}

impl PromptManager {
    /// Returns the blocking view of this manager.
    #[must_use]
    pub fn blocking(&self) -> BlockingPromptManager<'_> {
        BlockingPromptManager { manager: self }
    }
}

impl BlockingPromptManager<'_> {
    /// Blocking form of [`PromptManager::create_prompt`].
    pub fn create_prompt(&self, prompt: Prompt, changelog: Option<String>) -> PromptResult<Prompt> {
        run_blocking("create_prompt", self.manager.create_prompt(prompt, changelog))
    }

    /// Blocking form of [`PromptManager::update_prompt`].
    pub fn update_prompt(
        &self,
        prompt: Prompt,
        bump_version: bool,
        changelog: Option<String>,
    ) -> PromptResult<Prompt> {
        run_blocking(
            "update_prompt",
            self.manager.update_prompt(prompt, bump_version, changelog),
        )
    }

    /// Blocking form of [`PromptManager::update_prompt_with`].
    pub fn update_prompt_with(
        &self,
        prompt: Prompt,
        mode: UpdateMode,
        changelog: Option<String>,
    ) -> PromptResult<Prompt> {
        run_blocking(
            "update_prompt_with",
            self.manager.update_prompt_with(prompt, mode, changelog),
        )
    }

    /// Blocking form of [`PromptManager::delete_prompt`].
    pub fn delete_prompt(&self, id: &PromptId) -> PromptResult<()> {
        run_blocking("delete_prompt", self.manager.delete_prompt(id))
    }

    /// Blocking form of [`PromptManager::render`].
    pub fn render(
        &self,
        id: &PromptId,
        variables: &Variables,
        version: Option<Version>,
    ) -> PromptResult<String> {
        run_blocking("render", self.manager.render(id, variables, version))
    }

    /// Blocking form of [`PromptManager::render_with`].
    pub fn render_with(
        &self,
        id: &PromptId,
        variables: &Variables,
        options: RenderOptions,
    ) -> PromptResult<String> {
        run_blocking("render_with", self.manager.render_with(id, variables, options))
    }

    /// Blocking form of [`PromptManager::render_messages`].
    pub fn render_messages(
        &self,
        id: &PromptId,
        variables: &Variables,
        options: RenderOptions,
    ) -> PromptResult<Vec<RenderedMessage>> {
        run_blocking(
            "render_messages",
            self.manager.render_messages(id, variables, options),
        )
    }

    /// Blocking form of [`PromptManager::render_for_plugin`].
    pub fn render_for_plugin(
        &self,
        plugin: &str,
        id: &PromptId,
        variables: &Variables,
        version: Option<Version>,
    ) -> PromptResult<Value> {
        run_blocking(
            "render_for_plugin",
            self.manager.render_for_plugin(plugin, id, variables, version),
        )
    }

    /// Blocking form of [`PromptManager::render_and_parse`].
    pub fn render_and_parse(
        &self,
        id: &PromptId,
        variables: &Variables,
        raw: &str,
        version: Option<Version>,
    ) -> PromptResult<Value> {
        run_blocking(
            "render_and_parse",
            self.manager.render_and_parse(id, variables, raw, version),
        )
    }

    /// Blocking form of [`PromptManager::get_prompt`].
    pub fn get_prompt(&self, id: &PromptId, version: Option<Version>) -> PromptResult<Prompt> {
        run_blocking("get_prompt", self.manager.get_prompt(id, version))
    }

    /// Blocking form of [`PromptManager::get_history`].
    pub fn get_history(&self, id: &PromptId) -> PromptResult<Vec<PromptVersion>> {
        run_blocking("get_history", self.manager.get_history(id))
    }

    /// Blocking form of [`PromptManager::get_history_between`].
    pub fn get_history_between(
        &self,
        id: &PromptId,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> PromptResult<Vec<PromptVersion>> {
        run_blocking(
            "get_history_between",
            self.manager.get_history_between(id, since, until),
        )
    }

    /// Blocking form of [`PromptManager::latest_version`].
    pub fn latest_version(&self, id: &PromptId) -> PromptResult<PromptVersion> {
        run_blocking("latest_version", self.manager.latest_version(id))
    }

    /// Blocking form of [`PromptManager::hydrate`].
    pub fn hydrate(&self) -> PromptResult<usize> {
        run_blocking("hydrate", self.manager.hydrate())
    }

    /// Blocking form of [`PromptManager::import_definitions`].
    pub fn import_definitions(&self, definitions: DefinitionSet) -> PromptResult<usize> {
        run_blocking(
            "import_definitions",
            self.manager.import_definitions(definitions),
        )
    }

    /// Blocking form of [`PromptManager::template_cache_stats`].
    pub fn template_cache_stats(&self) -> PromptResult<TemplateCacheStats> {
        run_blocking("template_cache_stats", async {
            Ok(self.manager.template_cache_stats().await)
        })
    }

    /// Same as [`PromptManager::list_prompts`]; never touches a runtime.
    #[must_use]
    pub fn list_prompts(&self, filter: &PromptFilter) -> Vec<Prompt> {
        self.manager.list_prompts(filter)
    }
}
