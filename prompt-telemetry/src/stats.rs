//! In-process render statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use prompt_kernel::{PromptError, RenderObserver};
use prompt_primitives::{PromptId, PromptVersion, Version};
use prompt_template::Variables;
use serde::Serialize;

/// Point-in-time copy of [`StatsObserver`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    /// Renders that passed input validation.
    pub renders_started: u64,
    /// Renders that produced output, including cache hits.
    pub renders_completed: u64,
    /// Renders served from the render cache.
    pub cache_hits: u64,
    /// Failed renders.
    pub failures: u64,
    /// History entries committed.
    pub versions_created: u64,
}

impl RenderStats {
    /// Fraction of completed renders served from cache, or `None` before the first render.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cache_hit_rate(&self) -> Option<f64> {
        (self.renders_completed > 0)
            .then(|| self.cache_hits as f64 / self.renders_completed as f64)
    }
}

/// Observer counting render and version events.
#[derive(Debug, Default)]
pub struct StatsObserver {
    renders_started: AtomicU64,
    renders_completed: AtomicU64,
    cache_hits: AtomicU64,
    failures: AtomicU64,
    versions_created: AtomicU64,
}

impl StatsObserver {
    /// Creates an observer with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> RenderStats {
        RenderStats {
            renders_started: self.renders_started.load(Ordering::Relaxed),
            renders_completed: self.renders_completed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            versions_created: self.versions_created.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [
            &self.renders_started,
            &self.renders_completed,
            &self.cache_hits,
            &self.failures,
            &self.versions_created,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl RenderObserver for StatsObserver {
    fn on_render_start(&self, _: &PromptId, _: Version, _: &Variables) {
        self.renders_started.fetch_add(1, Ordering::Relaxed);
    }

    fn on_render_complete(&self, _: &PromptId, _: Version, _: &str, cached: bool) {
        self.renders_completed.fetch_add(1, Ordering::Relaxed);
        if cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_render_error(&self, _: &PromptId, _: Option<Version>, _: &PromptError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn on_version_created(&self, _: &PromptVersion) {
        self.versions_created.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_events() {
        let stats = StatsObserver::new();
        let id = PromptId::new("greeting").unwrap();
        let version = Version::new(1, 0, 0);

        stats.on_render_start(&id, version, &Variables::new());
        stats.on_render_complete(&id, version, "Hi", false);
        stats.on_render_complete(&id, version, "Hi", true);
        stats.on_render_error(
            &id,
            None,
            &PromptError::PromptNotFound { id: id.clone() },
        );

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.renders_started, 1);
        assert_eq!(snapshot.renders_completed, 2);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.cache_hit_rate(), Some(0.5));

        stats.reset();
        assert_eq!(stats.snapshot(), RenderStats::default());
        assert_eq!(stats.snapshot().cache_hit_rate(), None);
    }
}
