//! Bounded cache of compiled templates keyed by source text.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::TemplateResult;
use crate::parser::{CompiledTemplate, compile};

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, Arc<CompiledTemplate>>,
    order: VecDeque<String>,
}

/// Compiled-template cache with first-in-first-out eviction.
///
/// Compilation happens outside the lock; two tasks missing on the same source
/// concurrently both compile and the later insert wins, which is harmless
/// because compilation is deterministic.
#[derive(Debug)]
pub struct TemplateCache {
    capacity: NonZeroUsize,
    inner: RwLock<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TemplateCache {
    /// Creates a cache retaining at most `capacity` templates.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the compiled form of `source`, compiling and caching it on a miss.
    ///
    /// # Errors
    ///
    /// Propagates compilation errors; failed compilations are not cached.
    pub async fn get_or_compile(&self, source: &str) -> TemplateResult<Arc<CompiledTemplate>> {
        if let Some(hit) = self.inner.read().await.entries.get(source).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(len = source.len(), "template cache hit");
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(len = source.len(), "template cache miss");
        let compiled = Arc::new(compile(source)?);

        let mut guard = self.inner.write().await;
        if guard
            .entries
            .insert(source.to_owned(), Arc::clone(&compiled))
            .is_none()
        {
            guard.order.push_back(source.to_owned());
        }
        while guard.order.len() > self.capacity.get() {
            if let Some(evicted) = guard.order.pop_front() {
                guard.entries.remove(&evicted);
            }
        }
        Ok(compiled)
    }

    /// Removes the entry for `source`. Returns `true` if one was present.
    pub async fn invalidate(&self, source: &str) -> bool {
        let mut guard = self.inner.write().await;
        let removed = guard.entries.remove(source).is_some();
        if removed {
            guard.order.retain(|key| key != source);
        }
        removed
    }

    /// Drops every cached template.
    pub async fn clear(&self) {
        let mut guard = self.inner.write().await;
        guard.entries.clear();
        guard.order.clear();
    }

    /// Returns `true` if `source` is currently cached.
    pub async fn contains(&self, source: &str) -> bool {
        self.inner.read().await.entries.contains_key(source)
    }

    /// Returns a snapshot of cache utilisation.
    pub async fn stats(&self) -> TemplateCacheStats {
        let entries = self.inner.read().await.entries.len();
        TemplateCacheStats {
            entries,
            capacity: self.capacity.get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot describing template cache utilisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateCacheStats {
    /// Templates currently cached.
    pub entries: usize,
    /// Maximum number of cached templates.
    pub capacity: usize,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that required compilation.
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> TemplateCache {
        TemplateCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[tokio::test]
    async fn second_lookup_hits() {
        let cache = cache(4);
        let first = cache.get_or_compile("Hello {{name}}").await.unwrap();
        let second = cache.get_or_compile("Hello {{name}}").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[tokio::test]
    async fn evicts_oldest_entry() {
        let cache = cache(2);
        for source in ["a {{x}}", "b {{x}}", "c {{x}}"] {
            cache.get_or_compile(source).await.unwrap();
        }
        assert!(!cache.contains("a {{x}}").await);
        assert!(cache.contains("b {{x}}").await);
        assert!(cache.contains("c {{x}}").await);
    }

    #[tokio::test]
    async fn invalidation_forces_recompile() {
        let cache = cache(2);
        cache.get_or_compile("{{x}}").await.unwrap();
        assert!(cache.invalidate("{{x}}").await);
        assert!(!cache.invalidate("{{x}}").await);
        cache.get_or_compile("{{x}}").await.unwrap();
        assert_eq!(cache.stats().await.misses, 2);
    }

    #[tokio::test]
    async fn failed_compilation_is_not_cached() {
        let cache = cache(2);
        assert!(cache.get_or_compile("{{#if x}}").await.is_err());
        assert_eq!(cache.stats().await.entries, 0);
    }
}
