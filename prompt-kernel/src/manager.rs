//! The prompt manager: creation, versioned updates, rendering, and response parsing.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use prompt_config::{DefinitionSet, ManagerConfig};
use prompt_primitives::{
    BumpLevel, Prompt, PromptContent, PromptFilter, PromptId, PromptVersion, Role, Version,
};
use prompt_schema::{Schema, SchemaRegistry, input_description, output_instructions, parse_response};
use prompt_storage::{FileStorage, InMemoryStorage, PromptStorage};
use prompt_template::{TemplateCacheStats, TemplateConfig, TemplateEngine, TemplateError, Variables};
use prompt_versioning::{InMemoryVersionStore, JournalVersionStore, VersionStore};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{MemoryRenderCache, RenderCache, RenderKey};
use crate::error::{PromptError, PromptResult};
use crate::observer::{CompositeObserver, RenderObserver};
use crate::plugins::{PluginRegistry, PromptPlugin, RenderedMessage, RenderedPrompt};
use crate::registry::PromptRegistry;

/// How [`PromptManager::update_prompt_with`] treats the version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Overwrite the current version without a history entry. The payload
    /// must name the current version.
    InPlace,
    /// Bump the payload's version and commit a new history entry.
    Bump(BumpLevel),
}

/// Per-call render options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Render this version instead of the current one.
    pub version: Option<Version>,
    /// Consult and populate the render cache, when one is configured.
    pub use_cache: bool,
    /// Validate variables against the prompt's input schema.
    pub validate_input: bool,
    /// Override the engine's strictness for this call.
    pub strict: Option<bool>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            version: None,
            use_cache: true,
            validate_input: true,
            strict: None,
        }
    }
}

impl RenderOptions {
    /// Options rendering `version`.
    #[must_use]
    pub fn at_version(version: Version) -> Self {
        Self {
            version: Some(version),
            ..Self::default()
        }
    }

    /// Sets the strictness override.
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Bypasses the render cache.
    #[must_use]
    pub const fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Skips input validation.
    #[must_use]
    pub const fn without_input_validation(mut self) -> Self {
        self.validate_input = false;
        self
    }
}

#[derive(Debug, Clone)]
struct Settings {
    inject_output_instructions: bool,
    inject_input_description: bool,
    default_bump: BumpLevel,
    created_by: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inject_output_instructions: true,
            inject_input_description: false,
            default_bump: BumpLevel::Patch,
            created_by: None,
        }
    }
}

struct ManagerInner {
    registry: PromptRegistry,
    versions: Arc<dyn VersionStore>,
    engine: TemplateEngine,
    schemas: SchemaRegistry,
    render_cache: Option<Arc<dyn RenderCache>>,
    observer: Arc<dyn RenderObserver>,
    plugins: PluginRegistry,
    settings: Settings,
    write_gate: Mutex<()>,
    // Per-prompt counter folded into render-cache keys; bumped on every write.
    render_generations: StdMutex<HashMap<PromptId, u64>>,
}

/// Public façade over the registry, version store, template engine, and schemas.
///
/// The manager is cheap to clone; clones share state. Every operation is an
/// `async fn`; [`PromptManager::blocking`] exposes the same operations to
/// callers outside a runtime.
///
/// Mutations are serialised and run on a detached task, so cancelling the
/// caller's future never leaves a history commit without its registry write.
#[derive(Clone)]
pub struct PromptManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for PromptManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptManager")
            .field("registry", &self.inner.registry)
            .field("schemas", &self.inner.schemas)
            .field("plugins", &self.inner.plugins)
            .finish_non_exhaustive()
    }
}

impl PromptManager {
    /// Starts building a manager.
    #[must_use]
    pub fn builder() -> PromptManagerBuilder {
        PromptManagerBuilder::default()
    }

    /// Builds a manager from configuration, opening file backends when
    /// configured and hydrating the registry from storage.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Config`] for invalid settings and
    /// [`PromptError::Storage`] when backends cannot be opened.
    pub async fn from_config(config: &ManagerConfig) -> PromptResult<Self> {
        let mut builder = Self::builder().config(config)?;
        if let (Some(prompts_dir), Some(history_path)) =
            (config.storage.prompts_dir(), config.storage.history_path())
        {
            let storage = FileStorage::open(prompts_dir).await?;
            let versions = JournalVersionStore::open(history_path).await?;
            builder = builder
                .storage(Arc::new(storage))
                .version_store(Arc::new(versions));
        }
        let manager = builder.build()?;
        manager.hydrate().await?;
        Ok(manager)
    }

    /// Creates a prompt and commits its first history entry.
    ///
    /// Every template source is compiled up front and schema references must
    /// already be registered.
    ///
    /// # Errors
    ///
    /// - [`PromptError::DuplicateVersion`] if `(id, version)` was ever committed.
    /// - [`PromptError::VersionConflict`] if a current prompt exists at an equal or higher version.
    /// - [`PromptError::TemplateSyntax`] or [`PromptError::UnknownSchema`] for invalid content.
    pub async fn create_prompt(&self, prompt: Prompt, changelog: Option<String>) -> PromptResult<Prompt> {
        self.mutate(move |inner| async move { inner.create(prompt, changelog).await })
            .await
    }

    /// Updates a prompt, bumping by the configured default level when
    /// `bump_version` is set and overwriting in place otherwise.
    ///
    /// # Errors
    ///
    /// See [`PromptManager::update_prompt_with`].
    pub async fn update_prompt(
        &self,
        prompt: Prompt,
        bump_version: bool,
        changelog: Option<String>,
    ) -> PromptResult<Prompt> {
        let mode = if bump_version {
            UpdateMode::Bump(self.inner.settings.default_bump)
        } else {
            UpdateMode::InPlace
        };
        self.update_prompt_with(prompt, mode, changelog).await
    }

    /// Updates a prompt with an explicit [`UpdateMode`].
    ///
    /// A bump computes the next version from the payload's version, so two
    /// writers starting from the same snapshot race for one version and the
    /// loser observes [`PromptError::DuplicateVersion`].
    ///
    /// # Errors
    ///
    /// - [`PromptError::PromptNotFound`] when no current prompt exists.
    /// - [`PromptError::DuplicateVersion`] when the bumped version was already committed.
    /// - [`PromptError::VersionConflict`] when the payload's version is stale.
    /// - [`PromptError::TemplateSyntax`] or [`PromptError::UnknownSchema`] for invalid content.
    pub async fn update_prompt_with(
        &self,
        prompt: Prompt,
        mode: UpdateMode,
        changelog: Option<String>,
    ) -> PromptResult<Prompt> {
        self.mutate(move |inner| async move { inner.update(prompt, mode, changelog).await })
            .await
    }

    /// Deletes every stored version of a prompt. History is retained.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::PromptNotFound`] when nothing was stored.
    pub async fn delete_prompt(&self, id: &PromptId) -> PromptResult<()> {
        let id = id.clone();
        self.mutate(move |inner| async move { inner.delete(&id).await })
            .await
    }

    /// Renders the current version of a prompt.
    ///
    /// # Errors
    ///
    /// See [`PromptManager::render_with`].
    pub async fn render(
        &self,
        id: &PromptId,
        variables: &Variables,
        version: Option<Version>,
    ) -> PromptResult<String> {
        let options = RenderOptions {
            version,
            ..RenderOptions::default()
        };
        self.render_with(id, variables, options).await
    }

    /// Renders a prompt to text.
    ///
    /// Variables are validated against the input schema before any template
    /// work; the validated value (with defaults applied) is what gets
    /// rendered. Chat prompts render as `role: content` blocks separated by a
    /// blank line. Output instructions are appended when the prompt declares
    /// an output schema.
    ///
    /// # Errors
    ///
    /// - [`PromptError::PromptNotFound`] or [`PromptError::VersionNotFound`].
    /// - [`PromptError::SchemaValidation`] for rejected variables.
    /// - [`PromptError::TemplateRender`] for strict-mode misses.
    pub async fn render_with(
        &self,
        id: &PromptId,
        variables: &Variables,
        options: RenderOptions,
    ) -> PromptResult<String> {
        let generation = self.inner.render_generation(id);
        let prompt = self.inner.resolve_observed(id, options.version).await?;
        let result = self
            .inner
            .render_text(&prompt, variables, options, generation)
            .await;
        self.inner.report(&prompt, result)
    }

    /// Renders a prompt to structured messages.
    ///
    /// A text prompt yields a single user message. Input descriptions and
    /// output instructions, when enabled, become leading and trailing system
    /// messages. The render cache is not consulted.
    ///
    /// # Errors
    ///
    /// See [`PromptManager::render_with`].
    pub async fn render_messages(
        &self,
        id: &PromptId,
        variables: &Variables,
        options: RenderOptions,
    ) -> PromptResult<Vec<RenderedMessage>> {
        let prompt = self.inner.resolve_observed(id, options.version).await?;
        let result = self
            .inner
            .render_full(&prompt, variables, options)
            .await
            .map(|rendered| rendered.messages);
        self.inner.report(&prompt, result)
    }

    /// Renders a prompt and converts it with the named plugin.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::PluginNotFound`], [`PromptError::Plugin`], or any render error.
    pub async fn render_for_plugin(
        &self,
        plugin: &str,
        id: &PromptId,
        variables: &Variables,
        version: Option<Version>,
    ) -> PromptResult<Value> {
        let converter = self.inner.plugins.get(plugin)?;
        let prompt = self.inner.resolve_observed(id, version).await?;
        if !converter.supports(&prompt) {
            return Err(PromptError::Plugin {
                name: plugin.to_owned(),
                reason: format!("prompt `{id}` is not supported"),
            });
        }
        let options = RenderOptions {
            version,
            ..RenderOptions::default()
        };
        let result = self.inner.render_full(&prompt, variables, options).await;
        let rendered = self.inner.report(&prompt, result)?;
        converter
            .convert(&rendered)
            .map_err(|reason| PromptError::Plugin {
                name: plugin.to_owned(),
                reason,
            })
    }

    /// Parses a raw model response and validates it against the prompt's output schema.
    ///
    /// Variables are validated against the input schema first. Without an
    /// output schema the response only has to be JSON.
    ///
    /// # Errors
    ///
    /// - [`PromptError::ResponseParse`] when `raw` is not JSON.
    /// - [`PromptError::SchemaValidation`] when the input or the response is rejected.
    pub async fn render_and_parse(
        &self,
        id: &PromptId,
        variables: &Variables,
        raw: &str,
        version: Option<Version>,
    ) -> PromptResult<Value> {
        let prompt = self.inner.resolve(id, version).await?;
        self.inner.validated_variables(&prompt, variables, true)?;
        let parsed = match prompt.output_schema() {
            Some(schema) => self.inner.schemas.parse_and_validate(schema, raw),
            None => parse_response(raw),
        };
        let value = parsed.map_err(|err| PromptError::from(err).for_prompt(id))?;
        debug!(prompt_id = %id, "model response validated");
        Ok(value)
    }

    /// Validates an already-parsed value against a registered schema.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::UnknownSchema`] or [`PromptError::SchemaValidation`].
    pub fn validate_output(&self, schema: &str, value: &Value) -> PromptResult<Value> {
        Ok(self.inner.schemas.validate(schema, value)?)
    }

    /// Returns a prompt, current or at `version`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::PromptNotFound`] or [`PromptError::VersionNotFound`].
    pub async fn get_prompt(&self, id: &PromptId, version: Option<Version>) -> PromptResult<Prompt> {
        self.inner.resolve(id, version).await
    }

    /// Returns current prompts matching `filter`, sorted by id.
    #[must_use]
    pub fn list_prompts(&self, filter: &PromptFilter) -> Vec<Prompt> {
        self.inner.registry.list(filter)
    }

    /// Returns the full history of a prompt in commit order.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::PromptNotFound`] when nothing was ever committed.
    pub async fn get_history(&self, id: &PromptId) -> PromptResult<Vec<PromptVersion>> {
        let history = self.inner.versions.history(id).await?;
        if history.is_empty() {
            return Err(PromptError::not_found(id));
        }
        Ok(history)
    }

    /// Returns history entries created within `[since, until]`; open bounds are unbounded.
    ///
    /// # Errors
    ///
    /// See [`PromptManager::get_history`].
    pub async fn get_history_between(
        &self,
        id: &PromptId,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> PromptResult<Vec<PromptVersion>> {
        let history = self.get_history(id).await?;
        Ok(history
            .into_iter()
            .filter(|entry| since.is_none_or(|since| entry.created_at() >= since))
            .filter(|entry| until.is_none_or(|until| entry.created_at() <= until))
            .collect())
    }

    /// Returns the most recent history entry of a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::VersionNotFound`] when nothing was committed.
    pub async fn latest_version(&self, id: &PromptId) -> PromptResult<PromptVersion> {
        Ok(self.inner.versions.latest(id).await?)
    }

    /// Registers a schema for use as an input or output contract.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::InvalidSchema`] when the name is taken.
    pub fn register_schema(&self, schema: Schema) -> PromptResult<()> {
        Ok(self.inner.schemas.register(schema)?)
    }

    /// Returns the schema registry.
    #[must_use]
    pub fn schemas(&self) -> &SchemaRegistry {
        &self.inner.schemas
    }

    /// Registers a format-conversion plugin.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Plugin`] when the name is taken.
    pub fn register_plugin(&self, plugin: Arc<dyn PromptPlugin>) -> PromptResult<()> {
        self.inner.plugins.register(plugin)
    }

    /// Returns the plugin registry.
    #[must_use]
    pub fn plugins(&self) -> &PluginRegistry {
        &self.inner.plugins
    }

    /// Loads the latest stored version of every prompt into the registry.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn hydrate(&self) -> PromptResult<usize> {
        let count = self.inner.registry.hydrate().await?;
        info!(count, "prompt registry hydrated");
        Ok(count)
    }

    /// Registers loaded schemas, then creates every loaded prompt whose
    /// `(id, version)` has not been committed yet. Returns the number of
    /// prompts created.
    ///
    /// # Errors
    ///
    /// Stops at the first schema or prompt that is rejected.
    pub async fn import_definitions(&self, definitions: DefinitionSet) -> PromptResult<usize> {
        for schema in definitions.schemas {
            if !self.inner.schemas.contains(schema.name()) {
                self.register_schema(schema)?;
            }
        }
        let mut created = 0;
        for prompt in definitions.prompts {
            if self.inner.versions.contains(prompt.id(), prompt.version()).await? {
                debug!(prompt_id = %prompt.id(), version = %prompt.version(), "definition already imported");
                continue;
            }
            self.create_prompt(prompt, Some("imported from definition file".to_owned()))
                .await?;
            created += 1;
        }
        Ok(created)
    }

    /// Returns compiled-template cache statistics.
    pub async fn template_cache_stats(&self) -> TemplateCacheStats {
        self.inner.engine.cache_stats().await
    }

    /// Runs a mutation on a detached task behind the write gate.
    async fn mutate<T, F, Fut>(&self, op: F) -> PromptResult<T>
    where
        F: FnOnce(Arc<ManagerInner>) -> Fut,
        Fut: Future<Output = PromptResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let operation = op(Arc::clone(&inner));
        let task = tokio::spawn(async move {
            let _gate = inner.write_gate.lock().await;
            operation.await
        });
        task.await.map_err(|err| PromptError::SchedulerUnavailable {
            reason: err.to_string(),
        })?
    }
}

impl ManagerInner {
    async fn create(&self, prompt: Prompt, changelog: Option<String>) -> PromptResult<Prompt> {
        let id = prompt.id().clone();
        let version = prompt.version();
        self.check_prompt(&prompt).await?;

        if self.versions.contains(&id, version).await? {
            return Err(PromptError::DuplicateVersion { id, version });
        }
        let current = self.registry.find(&id).await?;
        if let Some(current) = &current
            && version <= current.version()
        {
            return Err(PromptError::VersionConflict {
                id,
                current: current.version(),
                requested: version,
            });
        }

        let entry = self.snapshot(&prompt, changelog, current.as_ref().map(Prompt::version));
        let entry = self.commit(&prompt, entry).await?;
        self.invalidate_renders(&id).await;
        self.observer.on_version_created(&entry);
        info!(prompt_id = %id, %version, "prompt created");
        Ok(prompt)
    }

    async fn update(
        &self,
        mut prompt: Prompt,
        mode: UpdateMode,
        changelog: Option<String>,
    ) -> PromptResult<Prompt> {
        let id = prompt.id().clone();
        let current = self.registry.get(&id).await?;
        self.check_prompt(&prompt).await?;

        match mode {
            UpdateMode::Bump(level) => {
                let version = prompt.version().bump(level);
                prompt.set_version(version);
                if self.versions.contains(&id, version).await? {
                    return Err(PromptError::DuplicateVersion { id, version });
                }
                if version <= current.version() {
                    return Err(PromptError::VersionConflict {
                        id,
                        current: current.version(),
                        requested: version,
                    });
                }
                let entry = self.snapshot(&prompt, changelog, Some(current.version()));
                let entry = self.commit(&prompt, entry).await?;
                self.invalidate_sources(&current, &prompt).await;
                self.invalidate_renders(&id).await;
                self.observer.on_version_created(&entry);
                info!(prompt_id = %id, %version, previous = %current.version(), "prompt version bumped");
            }
            UpdateMode::InPlace => {
                if prompt.version() != current.version() {
                    return Err(PromptError::VersionConflict {
                        id,
                        current: current.version(),
                        requested: prompt.version(),
                    });
                }
                self.registry.put(prompt.clone()).await?;
                self.invalidate_sources(&current, &prompt).await;
                self.invalidate_renders(&id).await;
                info!(prompt_id = %id, version = %prompt.version(), "prompt updated in place");
            }
        }
        Ok(prompt)
    }

    async fn delete(&self, id: &PromptId) -> PromptResult<()> {
        let current = self.registry.find(id).await?;
        if !self.registry.delete(id).await? {
            return Err(PromptError::not_found(id));
        }
        if let Some(current) = &current {
            for source in current.template_sources() {
                self.engine.invalidate(source).await;
            }
        }
        self.invalidate_renders(id).await;
        info!(prompt_id = %id, "prompt deleted");
        Ok(())
    }

    /// Stores `prompt`, records `entry`, then makes `prompt` current.
    ///
    /// A failed history append removes the stored record again, so either
    /// all three writes land or none is visible.
    async fn commit(&self, prompt: &Prompt, entry: PromptVersion) -> PromptResult<PromptVersion> {
        self.registry.persist(prompt).await?;
        let entry = match self.versions.append(entry).await {
            Ok(entry) => entry,
            Err(err) => {
                if let Err(undo) = self.registry.discard(prompt.id(), prompt.version()).await {
                    warn!(
                        prompt_id = %prompt.id(),
                        version = %prompt.version(),
                        error = %undo,
                        "failed to roll back stored prompt version"
                    );
                }
                return Err(err.into());
            }
        };
        self.registry.install(prompt.clone());
        Ok(entry)
    }

    fn snapshot(&self, prompt: &Prompt, changelog: Option<String>, parent: Option<Version>) -> PromptVersion {
        let mut entry = PromptVersion::new(prompt.clone(), changelog);
        if let Some(created_by) = &self.settings.created_by {
            entry = entry.with_created_by(created_by.clone());
        }
        if let Some(parent) = parent {
            entry = entry.with_parent_version(parent);
        }
        entry
    }

    async fn check_prompt(&self, prompt: &Prompt) -> PromptResult<()> {
        for name in [prompt.input_schema(), prompt.output_schema()].into_iter().flatten() {
            if !self.schemas.contains(name) {
                return Err(PromptError::UnknownSchema {
                    name: name.to_owned(),
                });
            }
        }
        let compiles = prompt
            .template_sources()
            .into_iter()
            .map(|source| self.engine.compile_cached(source));
        try_join_all(compiles)
            .await
            .map_err(|source| PromptError::TemplateSyntax {
                id: prompt.id().clone(),
                source,
            })?;
        Ok(())
    }

    async fn invalidate_sources(&self, previous: &Prompt, next: &Prompt) {
        let retained = next.template_sources();
        for source in previous.template_sources() {
            if !retained.contains(&source) {
                self.engine.invalidate(source).await;
            }
        }
    }

    async fn invalidate_renders(&self, id: &PromptId) {
        if let Some(cache) = &self.render_cache {
            *self
                .render_generations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(id.clone())
                .or_default() += 1;
            cache.invalidate_prompt(id).await;
        }
    }

    fn render_generation(&self, id: &PromptId) -> u64 {
        self.render_generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
            .unwrap_or_default()
    }

    async fn resolve(&self, id: &PromptId, version: Option<Version>) -> PromptResult<Prompt> {
        let Some(version) = version else {
            return self.registry.get(id).await;
        };
        match self.registry.get_version(id, version).await {
            Err(PromptError::VersionNotFound { .. }) => {
                let entry = self.versions.get(id, version).await?;
                Ok(entry.prompt().clone())
            }
            other => other,
        }
    }

    async fn resolve_observed(&self, id: &PromptId, version: Option<Version>) -> PromptResult<Prompt> {
        self.resolve(id, version).await.inspect_err(|err| {
            self.observer.on_render_error(id, version, err);
        })
    }

    fn report<T>(&self, prompt: &Prompt, result: PromptResult<T>) -> PromptResult<T> {
        result.inspect_err(|err| {
            self.observer
                .on_render_error(prompt.id(), Some(prompt.version()), err);
        })
    }

    fn validated_variables(
        &self,
        prompt: &Prompt,
        variables: &Variables,
        validate: bool,
    ) -> PromptResult<Variables> {
        let Some(schema) = prompt.input_schema().filter(|_| validate) else {
            return Ok(variables.clone());
        };
        let validated = self
            .schemas
            .validate(schema, &Value::Object(variables.clone()))
            .map_err(|err| PromptError::from(err).for_prompt(prompt.id()))?;
        match validated {
            Value::Object(map) => Ok(map),
            _ => Ok(variables.clone()),
        }
    }

    async fn render_text(
        &self,
        prompt: &Prompt,
        variables: &Variables,
        options: RenderOptions,
        generation: u64,
    ) -> PromptResult<String> {
        let variables = self.validated_variables(prompt, variables, options.validate_input)?;
        let (id, version) = (prompt.id(), prompt.version());
        self.observer.on_render_start(id, version, &variables);

        let strict = options.strict.unwrap_or(self.engine.config().strict());
        let cached = self
            .render_cache
            .as_ref()
            .filter(|_| options.use_cache)
            .map(|cache| {
                let key = RenderKey::new(id, version, strict, &variables).with_generation(generation);
                (cache, key)
            });
        if let Some((cache, key)) = &cached
            && let Some(hit) = cache.get(key).await
        {
            debug!(prompt_id = %id, %version, "render cache hit");
            self.observer.on_render_complete(id, version, &hit, true);
            return Ok(hit);
        }

        let rendered = self.render_prompt(prompt, &variables, strict).await?;
        if let Some((cache, key)) = cached {
            cache.set(key, rendered.text.clone()).await;
        }
        self.observer.on_render_complete(id, version, &rendered.text, false);
        Ok(rendered.text)
    }

    async fn render_full(
        &self,
        prompt: &Prompt,
        variables: &Variables,
        options: RenderOptions,
    ) -> PromptResult<RenderedPrompt> {
        let variables = self.validated_variables(prompt, variables, options.validate_input)?;
        self.observer
            .on_render_start(prompt.id(), prompt.version(), &variables);
        let strict = options.strict.unwrap_or(self.engine.config().strict());
        let rendered = self.render_prompt(prompt, &variables, strict).await?;
        self.observer
            .on_render_complete(prompt.id(), prompt.version(), &rendered.text, false);
        Ok(rendered)
    }

    async fn render_prompt(
        &self,
        prompt: &Prompt,
        variables: &Variables,
        strict: bool,
    ) -> PromptResult<RenderedPrompt> {
        let id = prompt.id();
        let syntax = |source: TemplateError| PromptError::TemplateSyntax {
            id: id.clone(),
            source,
        };
        let render_error = |source: TemplateError| PromptError::TemplateRender {
            id: id.clone(),
            version: prompt.version(),
            source,
        };

        let partials = self
            .engine
            .compile_partials(prompt.content().partials())
            .await
            .map_err(syntax)?;

        let (body, mut messages) = match prompt.content() {
            PromptContent::Text(template) => {
                let compiled = self
                    .engine
                    .compile_cached(&template.content)
                    .await
                    .map_err(syntax)?;
                let text = self
                    .engine
                    .render_with_strict(&compiled, variables, &partials, strict)
                    .map_err(render_error)?;
                let message = RenderedMessage {
                    role: Role::User,
                    content: text.clone(),
                    name: None,
                };
                (text, vec![message])
            }
            PromptContent::Chat(template) => {
                let mut messages = Vec::with_capacity(template.messages.len());
                for message in &template.messages {
                    let compiled = self
                        .engine
                        .compile_cached(&message.content)
                        .await
                        .map_err(syntax)?;
                    let content = self
                        .engine
                        .render_with_strict(&compiled, variables, &partials, strict)
                        .map_err(render_error)?;
                    messages.push(RenderedMessage {
                        role: message.role,
                        content,
                        name: message.name.clone(),
                    });
                }
                let text = messages
                    .iter()
                    .map(|message| format!("{}: {}", message.role, message.content))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                (text, messages)
            }
        };

        let mut sections = Vec::with_capacity(3);
        if self.settings.inject_input_description
            && let Some(name) = prompt.input_schema()
        {
            let schema = self.schemas.require(name)?;
            let description = input_description(&schema);
            messages.insert(0, system_message(&description));
            sections.push(description);
        }
        sections.push(body);
        if self.settings.inject_output_instructions
            && let Some(name) = prompt.output_schema()
        {
            let schema = self.schemas.require(name)?;
            let instructions = output_instructions(&schema);
            messages.push(system_message(&instructions));
            sections.push(instructions);
        }

        Ok(RenderedPrompt {
            prompt_id: id.clone(),
            version: prompt.version(),
            format: prompt.format(),
            text: sections.join("\n\n"),
            messages,
            output_schema: prompt.output_schema().map(ToOwned::to_owned),
        })
    }
}

fn system_message(content: &str) -> RenderedMessage {
    RenderedMessage {
        role: Role::System,
        content: content.to_owned(),
        name: None,
    }
}

/// Builder for [`PromptManager`].
#[derive(Default)]
pub struct PromptManagerBuilder {
    storage: Option<Arc<dyn PromptStorage>>,
    versions: Option<Arc<dyn VersionStore>>,
    template: TemplateConfig,
    schemas: Vec<Schema>,
    render_cache: Option<Arc<dyn RenderCache>>,
    observers: CompositeObserver,
    plugins: Vec<Arc<dyn PromptPlugin>>,
    settings: Settings,
}

impl PromptManagerBuilder {
    /// Applies every setting in `config` except the storage backend, which
    /// [`PromptManager::from_config`] opens asynchronously.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Config`] when the configuration is invalid.
    pub fn config(mut self, config: &ManagerConfig) -> PromptResult<Self> {
        config
            .validate()
            .map_err(|err| PromptError::config(err.to_string()))?;
        let non_zero = |value: usize, field: &str| {
            NonZeroUsize::new(value)
                .ok_or_else(|| PromptError::config(format!("{field} must be at least 1")))
        };

        self.template = TemplateConfig::new()
            .with_strict(config.template.strict)
            .with_max_partial_depth(config.template.max_partial_depth)
            .with_cache_capacity(non_zero(
                config.template.cache_capacity,
                "template.cache_capacity",
            )?);
        self.settings.inject_output_instructions = config.render.inject_output_instructions;
        self.settings.inject_input_description = config.render.inject_input_description;
        self.settings.default_bump = config.versioning.default_bump;
        self.settings.created_by.clone_from(&config.versioning.created_by);
        self.render_cache = if config.render.cache_enabled {
            let mut cache = MemoryRenderCache::new(non_zero(
                config.render.cache_capacity,
                "render.cache_capacity",
            )?);
            if let Some(ttl) = config.render.cache_ttl_secs {
                cache = cache.with_ttl(Duration::from_secs(ttl));
            }
            Some(Arc::new(cache))
        } else {
            None
        };
        Ok(self)
    }

    /// Sets the storage backend (default: in-memory).
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn PromptStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the version store (default: in-memory).
    #[must_use]
    pub fn version_store(mut self, versions: Arc<dyn VersionStore>) -> Self {
        self.versions = Some(versions);
        self
    }

    /// Sets the template engine configuration.
    #[must_use]
    pub fn template_config(mut self, config: TemplateConfig) -> Self {
        self.template = config;
        self
    }

    /// Registers a schema at build time.
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Enables render caching with the supplied cache.
    #[must_use]
    pub fn render_cache(mut self, cache: Arc<dyn RenderCache>) -> Self {
        self.render_cache = Some(cache);
        self
    }

    /// Adds an observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn RenderObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Registers a plugin at build time.
    #[must_use]
    pub fn plugin(mut self, plugin: Arc<dyn PromptPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Appends output-schema instructions to rendered text (default: on).
    #[must_use]
    pub fn inject_output_instructions(mut self, enabled: bool) -> Self {
        self.settings.inject_output_instructions = enabled;
        self
    }

    /// Prepends input-schema descriptions to rendered text (default: off).
    #[must_use]
    pub fn inject_input_description(mut self, enabled: bool) -> Self {
        self.settings.inject_input_description = enabled;
        self
    }

    /// Sets the bump level used by [`PromptManager::update_prompt`].
    #[must_use]
    pub fn default_bump(mut self, level: BumpLevel) -> Self {
        self.settings.default_bump = level;
        self
    }

    /// Records `author` on every history entry.
    #[must_use]
    pub fn created_by(mut self, author: impl Into<String>) -> Self {
        self.settings.created_by = Some(author.into());
        self
    }

    /// Builds the manager.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::InvalidSchema`] or [`PromptError::Plugin`] when
    /// two build-time registrations share a name.
    pub fn build(self) -> PromptResult<PromptManager> {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(InMemoryStorage::new()));
        let versions = self
            .versions
            .unwrap_or_else(|| Arc::new(InMemoryVersionStore::new()));

        let schemas = SchemaRegistry::new();
        for schema in self.schemas {
            schemas.register(schema)?;
        }
        let plugins = PluginRegistry::new();
        for plugin in self.plugins {
            plugins.register(plugin)?;
        }

        Ok(PromptManager {
            inner: Arc::new(ManagerInner {
                registry: PromptRegistry::new(storage),
                versions,
                engine: TemplateEngine::new(self.template),
                schemas,
                render_cache: self.render_cache,
                observer: Arc::new(self.observers),
                plugins,
                settings: self.settings,
                write_gate: Mutex::new(()),
                render_generations: StdMutex::new(HashMap::new()),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use prompt_primitives::Message;
    use prompt_schema::{Field, FieldType, Validator};
    use serde_json::json;

    use super::*;

    fn vars(value: Value) -> Variables {
        value.as_object().cloned().unwrap_or_default()
    }

    fn id(raw: &str) -> PromptId {
        PromptId::new(raw).unwrap()
    }

    fn greeting(version: &str, content: &str) -> Prompt {
        Prompt::builder("greeting")
            .version(version)
            .text(content)
            .build()
            .unwrap()
    }

    #[derive(Default)]
    struct Events(StdMutex<Vec<String>>);

    impl RenderObserver for Events {
        fn on_render_complete(&self, _: &PromptId, _: Version, _: &str, cached: bool) {
            self.0.lock().unwrap().push(format!("complete:{cached}"));
        }

        fn on_render_error(&self, _: &PromptId, _: Option<Version>, error: &PromptError) {
            self.0.lock().unwrap().push(format!("error:{:?}", error.kind()));
        }

        fn on_version_created(&self, version: &PromptVersion) {
            self.0.lock().unwrap().push(format!("version:{}", version.version()));
        }
    }

    #[tokio::test]
    async fn create_rejects_malformed_templates_and_unknown_schemas() {
        let manager = PromptManager::builder().build().unwrap();
        let err = manager
            .create_prompt(greeting("1.0.0", "Hello {{#if name}}"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PromptError::TemplateSyntax { .. }));

        let prompt = Prompt::builder("greeting")
            .text("Hi")
            .output_schema("verdict")
            .build()
            .unwrap();
        assert_eq!(
            manager.create_prompt(prompt, None).await.unwrap_err(),
            PromptError::UnknownSchema {
                name: "verdict".into()
            }
        );
        assert!(manager.list_prompts(&PromptFilter::new()).is_empty());
    }

    #[tokio::test]
    async fn create_refuses_to_go_backwards() {
        let manager = PromptManager::builder().build().unwrap();
        manager
            .create_prompt(greeting("2.0.0", "Hi"), None)
            .await
            .unwrap();
        let err = manager
            .create_prompt(greeting("1.5.0", "Hi"), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PromptError::VersionConflict {
                id: id("greeting"),
                current: Version::new(2, 0, 0),
                requested: Version::new(1, 5, 0),
            }
        );
    }

    #[tokio::test]
    async fn bump_records_parent_and_author() {
        let manager = PromptManager::builder()
            .created_by("ops")
            .default_bump(BumpLevel::Minor)
            .build()
            .unwrap();
        let created = manager
            .create_prompt(greeting("1.0.0", "Hi {{name}}"), Some("initial".into()))
            .await
            .unwrap();
        let updated = manager
            .update_prompt(created, true, Some("fix typo".into()))
            .await
            .unwrap();
        assert_eq!(updated.version(), Version::new(1, 1, 0));

        let latest = manager.latest_version(&id("greeting")).await.unwrap();
        assert_eq!(latest.parent_version(), Some(Version::new(1, 0, 0)));
        assert_eq!(latest.created_by(), Some("ops"));
        assert_eq!(latest.changelog(), Some("fix typo"));
    }

    #[tokio::test]
    async fn stale_in_place_update_conflicts() {
        let manager = PromptManager::builder().build().unwrap();
        let created = manager
            .create_prompt(greeting("1.0.0", "Hi"), None)
            .await
            .unwrap();
        manager
            .update_prompt(created.clone(), true, None)
            .await
            .unwrap();
        let err = manager
            .update_prompt(created, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PromptError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn renders_historical_versions() {
        let manager = PromptManager::builder().build().unwrap();
        let created = manager
            .create_prompt(greeting("1.0.0", "Hello {{name}}"), None)
            .await
            .unwrap();
        let mut next = created.clone();
        next.set_content(PromptContent::Text(prompt_primitives::TextTemplate::new(
            "Howdy {{name}}",
        )))
        .unwrap();
        manager.update_prompt(next, true, None).await.unwrap();

        let vars = vars(json!({"name": "Ada"}));
        let id = id("greeting");
        assert_eq!(manager.render(&id, &vars, None).await.unwrap(), "Howdy Ada");
        assert_eq!(
            manager
                .render(&id, &vars, Some(Version::new(1, 0, 0)))
                .await
                .unwrap(),
            "Hello Ada"
        );
        assert!(matches!(
            manager.render(&id, &vars, Some(Version::new(3, 0, 0))).await,
            Err(PromptError::VersionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn chat_prompts_render_role_blocks_and_messages() {
        let manager = PromptManager::builder().build().unwrap();
        let prompt = Prompt::builder("support")
            .message(Message::system("You help {{company}} customers."))
            .message(Message::user("{{query}}").with_name("customer"))
            .build()
            .unwrap();
        manager.create_prompt(prompt, None).await.unwrap();

        let vars = vars(json!({"company": "Acme", "query": "Where is my order?"}));
        let text = manager.render(&id("support"), &vars, None).await.unwrap();
        assert_eq!(
            text,
            "system: You help Acme customers.\n\nuser: Where is my order?"
        );

        let messages = manager
            .render_messages(&id("support"), &vars, RenderOptions::default())
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].name.as_deref(), Some("customer"));
    }

    #[tokio::test]
    async fn injects_schema_sections() {
        let schema = |name: &str| {
            Schema::builder(name)
                .description("Sentiment verdict")
                .field(
                    Field::new("sentiment", FieldType::Enum)
                        .with_validator(Validator::one_of(["positive", "negative"])),
                )
                .build()
                .unwrap()
        };
        let manager = PromptManager::builder()
            .schema(schema("verdict"))
            .schema(schema("review_input"))
            .inject_input_description(true)
            .build()
            .unwrap();
        let prompt = Prompt::builder("review")
            .text("Classify: {{sentiment}}")
            .input_schema("review_input")
            .output_schema("verdict")
            .build()
            .unwrap();
        manager.create_prompt(prompt, None).await.unwrap();

        let text = manager
            .render(&id("review"), &vars(json!({"sentiment": "positive"})), None)
            .await
            .unwrap();
        let sections: Vec<_> = text.split("\n\n").collect();
        assert_eq!(sections[0], "# Input Requirements");
        assert!(text.contains("\n\nClassify: positive\n\n# Output Requirements\n"));

        let messages = manager
            .render_messages(
                &id("review"),
                &vars(json!({"sentiment": "negative"})),
                RenderOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "Classify: negative");
        assert!(messages[2].content.starts_with("# Output Requirements"));
    }

    #[tokio::test]
    async fn render_cache_serves_repeats_and_is_invalidated_on_update() {
        let events = Arc::new(Events::default());
        let manager = PromptManager::builder()
            .render_cache(Arc::new(MemoryRenderCache::new(NonZeroUsize::new(8).unwrap())))
            .observer(events.clone())
            .build()
            .unwrap();
        let created = manager
            .create_prompt(greeting("1.0.0", "Hello {{name}}"), None)
            .await
            .unwrap();

        let vars = vars(json!({"name": "Ada"}));
        let id = id("greeting");
        manager.render(&id, &vars, None).await.unwrap();
        manager.render(&id, &vars, None).await.unwrap();

        let mut edited = created;
        edited
            .set_content(PromptContent::Text(prompt_primitives::TextTemplate::new(
                "Bye {{name}}",
            )))
            .unwrap();
        manager.update_prompt(edited, false, None).await.unwrap();
        assert_eq!(manager.render(&id, &vars, None).await.unwrap(), "Bye Ada");

        assert_eq!(
            *events.0.lock().unwrap(),
            [
                "version:1.0.0",
                "complete:false",
                "complete:true",
                "complete:false"
            ]
        );
    }

    #[tokio::test]
    async fn render_errors_reach_observers() {
        let events = Arc::new(Events::default());
        let manager = PromptManager::builder()
            .observer(events.clone())
            .build()
            .unwrap();
        let err = manager
            .render(&id("ghost"), &Variables::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::PromptNotFound);
        assert_eq!(*events.0.lock().unwrap(), ["error:PromptNotFound"]);
    }

    #[tokio::test]
    async fn delete_keeps_history() {
        let manager = PromptManager::builder().build().unwrap();
        manager
            .create_prompt(greeting("1.0.0", "Hi"), None)
            .await
            .unwrap();
        manager.delete_prompt(&id("greeting")).await.unwrap();

        assert!(matches!(
            manager.get_prompt(&id("greeting"), None).await,
            Err(PromptError::PromptNotFound { .. })
        ));
        assert_eq!(manager.get_history(&id("greeting")).await.unwrap().len(), 1);
        assert!(matches!(
            manager.delete_prompt(&id("greeting")).await,
            Err(PromptError::PromptNotFound { .. })
        ));
        assert!(matches!(
            manager.create_prompt(greeting("1.0.0", "Hi"), None).await,
            Err(PromptError::DuplicateVersion { .. })
        ));
    }
}
