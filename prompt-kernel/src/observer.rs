//! Render and version lifecycle observers.

use std::sync::Arc;

use prompt_primitives::{PromptId, PromptVersion, Version};
use prompt_template::Variables;
use tracing::{debug, info, warn};

use crate::error::PromptError;

/// Receives render and history events from the manager.
///
/// Callbacks run inline on the calling task and must not block.
pub trait RenderObserver: Send + Sync {
    /// A render passed input validation and is about to produce output.
    fn on_render_start(&self, _prompt_id: &PromptId, _version: Version, _variables: &Variables) {}

    /// A render produced output; `cached` is `true` when served from the render cache.
    fn on_render_complete(
        &self,
        _prompt_id: &PromptId,
        _version: Version,
        _rendered: &str,
        _cached: bool,
    ) {
    }

    /// A render failed. `version` is `None` when the prompt could not be resolved.
    fn on_render_error(&self, _prompt_id: &PromptId, _version: Option<Version>, _error: &PromptError) {}

    /// A new history entry was committed.
    fn on_version_created(&self, _version: &PromptVersion) {}
}

/// Observer that logs events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl RenderObserver for TracingObserver {
    fn on_render_start(&self, prompt_id: &PromptId, version: Version, variables: &Variables) {
        debug!(%prompt_id, %version, variables = variables.len(), "render started");
    }

    fn on_render_complete(&self, prompt_id: &PromptId, version: Version, rendered: &str, cached: bool) {
        debug!(%prompt_id, %version, bytes = rendered.len(), cached, "render completed");
    }

    fn on_render_error(&self, prompt_id: &PromptId, version: Option<Version>, error: &PromptError) {
        warn!(%prompt_id, version = ?version, kind = ?error.kind(), %error, "render failed");
    }

    fn on_version_created(&self, version: &PromptVersion) {
        info!(
            prompt_id = %version.prompt_id(),
            version = %version.version(),
            parent = ?version.parent_version(),
            changelog = version.changelog().unwrap_or_default(),
            "prompt version committed"
        );
    }
}

/// Forwards every event to a list of observers, in registration order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn RenderObserver>>,
}

impl CompositeObserver {
    /// Creates a composite from the supplied observers.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn RenderObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer.
    pub fn push(&mut self, observer: Arc<dyn RenderObserver>) {
        self.observers.push(observer);
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` if no observers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl RenderObserver for CompositeObserver {
    fn on_render_start(&self, prompt_id: &PromptId, version: Version, variables: &Variables) {
        for observer in &self.observers {
            observer.on_render_start(prompt_id, version, variables);
        }
    }

    fn on_render_complete(&self, prompt_id: &PromptId, version: Version, rendered: &str, cached: bool) {
        for observer in &self.observers {
            observer.on_render_complete(prompt_id, version, rendered, cached);
        }
    }

    fn on_render_error(&self, prompt_id: &PromptId, version: Option<Version>, error: &PromptError) {
        for observer in &self.observers {
            observer.on_render_error(prompt_id, version, error);
        }
    }

    fn on_version_created(&self, version: &PromptVersion) {
        for observer in &self.observers {
            observer.on_version_created(version);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    impl RenderObserver for Recording {
        fn on_render_complete(&self, prompt_id: &PromptId, _: Version, rendered: &str, cached: bool) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{prompt_id}:{rendered}:{cached}"));
        }
    }

    #[test]
    fn composite_fans_out_in_order() {
        let first = Arc::new(Recording::default());
        let second = Arc::new(Recording::default());
        let mut composite = CompositeObserver::new([first.clone() as Arc<dyn RenderObserver>]);
        composite.push(second.clone());
        composite.push(Arc::new(TracingObserver));
        assert_eq!(composite.len(), 3);

        let id = PromptId::new("greeting").unwrap();
        composite.on_render_complete(&id, Version::new(1, 0, 0), "Hi", false);
        composite.on_render_start(&id, Version::new(1, 0, 0), &Variables::new());

        assert_eq!(*first.events.lock().unwrap(), ["greeting:Hi:false"]);
        assert_eq!(*second.events.lock().unwrap(), ["greeting:Hi:false"]);
    }
}
