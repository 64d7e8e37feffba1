//! Rendered-output cache.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use prompt_primitives::{PromptId, Version};
use prompt_template::Variables;
use tokio::sync::Mutex;

/// Identity of one render: prompt, version, write generation, strictness,
/// and the canonical JSON encoding of the (validated) variables.
///
/// The generation changes whenever the prompt is written, so a render that
/// raced a write stores its text under a key later lookups never use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderKey {
    prompt_id: PromptId,
    version: Version,
    generation: u64,
    strict: bool,
    variables: String,
}

impl RenderKey {
    /// Builds a key. Object keys serialise in sorted order, so equal maps
    /// always produce equal keys.
    #[must_use]
    pub fn new(prompt_id: &PromptId, version: Version, strict: bool, variables: &Variables) -> Self {
        Self {
            prompt_id: prompt_id.clone(),
            version,
            generation: 0,
            strict,
            variables: serde_json::Value::Object(variables.clone()).to_string(),
        }
    }

    /// Scopes the key to one write generation of the prompt.
    #[must_use]
    pub const fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Returns the write generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the prompt identifier.
    #[must_use]
    pub fn prompt_id(&self) -> &PromptId {
        &self.prompt_id
    }

    /// Returns the rendered version.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }
}

/// Storage for rendered prompt text.
#[async_trait]
pub trait RenderCache: Send + Sync {
    /// Returns the cached render for `key`.
    async fn get(&self, key: &RenderKey) -> Option<String>;

    /// Stores a render.
    async fn set(&self, key: RenderKey, rendered: String);

    /// Drops every cached render of `prompt_id`, across versions.
    async fn invalidate_prompt(&self, prompt_id: &PromptId);

    /// Drops everything.
    async fn clear(&self);
}

struct Entry {
    rendered: String,
    stored_at: Instant,
}

#[derive(Default)]
struct State {
    entries: HashMap<RenderKey, Entry>,
    order: VecDeque<RenderKey>,
}

/// Capacity-bounded in-process cache with optional expiry.
///
/// When full, the oldest insertion is evicted.
pub struct MemoryRenderCache {
    state: Mutex<State>,
    capacity: NonZeroUsize,
    ttl: Option<Duration>,
}

impl std::fmt::Debug for MemoryRenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRenderCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl MemoryRenderCache {
    /// Creates a cache holding at most `capacity` renders.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            capacity,
            ttl: None,
        }
    }

    /// Expires entries `ttl` after they were stored.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Number of cached renders, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn expired(&self, entry: &Entry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }
}

#[async_trait]
impl RenderCache for MemoryRenderCache {
    async fn get(&self, key: &RenderKey) -> Option<String> {
        let mut state = self.state.lock().await;
        let entry = state.entries.get(key)?;
        if self.expired(entry) {
            state.entries.remove(key);
            state.order.retain(|queued| queued != key);
            return None;
        }
        Some(entry.rendered.clone())
    }

    async fn set(&self, key: RenderKey, rendered: String) {
        let mut state = self.state.lock().await;
        let entry = Entry {
            rendered,
            stored_at: Instant::now(),
        };
        if state.entries.insert(key.clone(), entry).is_none() {
            state.order.push_back(key);
        }
        while state.entries.len() > self.capacity.get() {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
        }
    }

    async fn invalidate_prompt(&self, prompt_id: &PromptId) {
        let mut state = self.state.lock().await;
        state.entries.retain(|key, _| key.prompt_id() != prompt_id);
        state.order.retain(|key| key.prompt_id() != prompt_id);
    }

    async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn key(id: &str, name: &str) -> RenderKey {
        let vars = json!({ "name": name }).as_object().cloned().unwrap();
        RenderKey::new(&PromptId::new(id).unwrap(), Version::new(1, 0, 0), false, &vars)
    }

    #[test]
    fn key_ignores_insertion_order() {
        let a = json!({"a": 1, "b": 2}).as_object().cloned().unwrap();
        let mut b = Variables::new();
        b.insert("b".into(), json!(2));
        b.insert("a".into(), json!(1));
        let id = PromptId::new("p").unwrap();
        assert_eq!(
            RenderKey::new(&id, Version::new(1, 0, 0), false, &a),
            RenderKey::new(&id, Version::new(1, 0, 0), false, &b)
        );
    }

    #[tokio::test]
    async fn generations_do_not_share_entries() {
        let cache = MemoryRenderCache::new(NonZeroUsize::new(8).unwrap());
        cache.set(key("p", "a"), "stale".into()).await;

        let next = key("p", "a").with_generation(1);
        assert_eq!(next.generation(), 1);
        assert!(cache.get(&next).await.is_none());
        cache.set(next.clone(), "fresh".into()).await;
        assert_eq!(cache.get(&next).await.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn evicts_oldest_when_full() {
        let cache = MemoryRenderCache::new(NonZeroUsize::new(2).unwrap());
        cache.set(key("p", "a"), "A".into()).await;
        cache.set(key("p", "b"), "B".into()).await;
        cache.set(key("p", "c"), "C".into()).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&key("p", "a")).await.is_none());
        assert_eq!(cache.get(&key("p", "c")).await.as_deref(), Some("C"));
    }

    #[tokio::test]
    async fn invalidates_by_prompt() {
        let cache = MemoryRenderCache::new(NonZeroUsize::new(8).unwrap());
        cache.set(key("p", "a"), "A".into()).await;
        cache.set(key("q", "a"), "A".into()).await;
        cache.invalidate_prompt(&PromptId::new("p").unwrap()).await;

        assert!(cache.get(&key("p", "a")).await.is_none());
        assert!(cache.get(&key("q", "a")).await.is_some());
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache =
            MemoryRenderCache::new(NonZeroUsize::new(8).unwrap()).with_ttl(Duration::from_millis(20));
        cache.set(key("p", "a"), "A".into()).await;
        assert!(cache.get(&key("p", "a")).await.is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get(&key("p", "a")).await.is_none());
        assert!(cache.is_empty().await);
    }
}
