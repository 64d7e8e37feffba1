//! Template engine façade combining compilation, caching, and rendering.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::Variables;
use crate::cache::{TemplateCache, TemplateCacheStats};
use crate::error::TemplateResult;
use crate::parser::{CompiledTemplate, compile};
use crate::render::{Partials, Renderer};

const DEFAULT_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(512).unwrap();
const DEFAULT_MAX_PARTIAL_DEPTH: usize = 8;

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateConfig {
    strict: bool,
    max_partial_depth: usize,
    cache_capacity: NonZeroUsize,
}

impl TemplateConfig {
    /// Creates the default configuration: lenient rendering, depth 8, 512 cached templates.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            strict: false,
            max_partial_depth: DEFAULT_MAX_PARTIAL_DEPTH,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// Enables or disables strict mode (missing variables and partials fail the render).
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the maximum partial nesting depth.
    #[must_use]
    pub const fn with_max_partial_depth(mut self, depth: usize) -> Self {
        self.max_partial_depth = depth;
        self
    }

    /// Sets the compiled-template cache capacity.
    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Returns whether strict mode is enabled.
    #[must_use]
    pub const fn strict(self) -> bool {
        self.strict
    }

    /// Returns the maximum partial nesting depth.
    #[must_use]
    pub const fn max_partial_depth(self) -> usize {
        self.max_partial_depth
    }

    /// Returns the cache capacity.
    #[must_use]
    pub const fn cache_capacity(self) -> NonZeroUsize {
        self.cache_capacity
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiles, caches, and renders templates.
///
/// Rendering is pure: the engine's only shared state is the compiled-template
/// cache, so a single engine may serve concurrent renders.
///
/// # Examples
///
/// ```
/// use prompt_template::{TemplateConfig, TemplateEngine, Partials};
/// use serde_json::json;
///
/// let engine = TemplateEngine::new(TemplateConfig::new().with_strict(true));
/// let compiled = engine.compile("Hello {{name}}!").unwrap();
/// let vars = json!({"name": "Ada"}).as_object().cloned().unwrap();
/// assert_eq!(engine.render(&compiled, &vars, &Partials::new()).unwrap(), "Hello Ada!");
/// ```
#[derive(Debug)]
pub struct TemplateEngine {
    config: TemplateConfig,
    cache: TemplateCache,
}

impl TemplateEngine {
    /// Creates an engine with the supplied configuration.
    #[must_use]
    pub fn new(config: TemplateConfig) -> Self {
        Self {
            config,
            cache: TemplateCache::new(config.cache_capacity()),
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> TemplateConfig {
        self.config
    }

    /// Returns the compiled-template cache.
    #[must_use]
    pub const fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// Compiles `source` without consulting the cache.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for malformed templates.
    pub fn compile(&self, source: &str) -> TemplateResult<CompiledTemplate> {
        compile(source)
    }

    /// Compiles `source` through the cache.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for malformed templates.
    pub async fn compile_cached(&self, source: &str) -> TemplateResult<Arc<CompiledTemplate>> {
        self.cache.get_or_compile(source).await
    }

    /// Compiles a set of named partial sources through the cache.
    ///
    /// # Errors
    ///
    /// Returns the first syntax error encountered.
    pub async fn compile_partials(
        &self,
        sources: &BTreeMap<String, String>,
    ) -> TemplateResult<Partials> {
        let mut partials = Partials::new();
        for (name, source) in sources {
            partials.insert(name.clone(), self.compile_cached(source).await?);
        }
        Ok(partials)
    }

    /// Renders a compiled template with the engine's strictness.
    ///
    /// # Errors
    ///
    /// In strict mode, fails when an interpolated variable or an included
    /// partial is absent. Always fails when partial nesting exceeds the limit.
    pub fn render(
        &self,
        template: &CompiledTemplate,
        variables: &Variables,
        partials: &Partials,
    ) -> TemplateResult<String> {
        self.render_with_strict(template, variables, partials, self.config.strict())
    }

    /// Renders a compiled template with an explicit strictness override.
    ///
    /// # Errors
    ///
    /// See [`TemplateEngine::render`].
    pub fn render_with_strict(
        &self,
        template: &CompiledTemplate,
        variables: &Variables,
        partials: &Partials,
        strict: bool,
    ) -> TemplateResult<String> {
        Renderer {
            partials,
            strict,
            max_partial_depth: self.config.max_partial_depth(),
        }
        .render(template, variables)
    }

    /// Compiles (through the cache) and renders `source` with the given partial sources.
    ///
    /// # Errors
    ///
    /// Propagates compile and render errors.
    pub async fn render_source(
        &self,
        source: &str,
        variables: &Variables,
        partial_sources: &BTreeMap<String, String>,
    ) -> TemplateResult<String> {
        let compiled = self.compile_cached(source).await?;
        let partials = self.compile_partials(partial_sources).await?;
        self.render(&compiled, variables, &partials)
    }

    /// Returns the root variable names referenced by `source`.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for malformed templates.
    pub fn extract_variables(&self, source: &str) -> TemplateResult<BTreeSet<String>> {
        extract_variables(source)
    }

    /// Checks that `source` compiles.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for malformed templates.
    pub fn validate(&self, source: &str) -> TemplateResult<()> {
        compile(source).map(|_| ())
    }

    /// Evicts `source` from the compiled-template cache.
    pub async fn invalidate(&self, source: &str) -> bool {
        self.cache.invalidate(source).await
    }

    /// Returns compiled-template cache statistics.
    pub async fn cache_stats(&self) -> TemplateCacheStats {
        self.cache.stats().await
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new(TemplateConfig::default())
    }
}

/// Statically extracts the root variable names referenced by `source`.
///
/// Names bound inside `{{#each}}` bodies are excluded because they resolve
/// against the iterated element first.
///
/// # Errors
///
/// Returns a syntax error for malformed templates.
pub fn extract_variables(source: &str) -> TemplateResult<BTreeSet<String>> {
    Ok(compile(source)?.variables())
}
