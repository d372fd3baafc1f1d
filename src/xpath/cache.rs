//! Compiled-expression cache
//!
//! A process-wide LRU keyed by expression text. One mutex guards both the
//! settings and the cache; compilation happens outside the lock.

use super::compiler::{self, CompiledExpr};
use lru::LruCache;
use once_cell::sync::Lazy;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

pub const DEFAULT_MAX_ENTRIES: usize = 50;

struct SelectorCache {
    enabled: bool,
    max_entries: usize,
    entries: Option<LruCache<String, Arc<CompiledExpr>>>,
}

impl SelectorCache {
    fn active(&self) -> bool {
        self.enabled && self.max_entries > 0
    }
}

static CACHE: Lazy<Mutex<SelectorCache>> = Lazy::new(|| {
    Mutex::new(SelectorCache {
        enabled: true,
        max_entries: DEFAULT_MAX_ENTRIES,
        entries: None,
    })
});

fn lock() -> MutexGuard<'static, SelectorCache> {
    // The cache holds no invariants a panicking thread could break.
    CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Turn caching on or off. Disabling drops all cached entries.
pub fn set_enabled(enabled: bool) {
    let mut cache = lock();
    cache.enabled = enabled;
    debug!(enabled, "selector cache toggled");
    if !enabled {
        cache.entries = None;
    }
}

/// Bound the number of cached expressions; 0 disables caching.
pub fn set_max_entries(max_entries: usize) {
    let mut cache = lock();
    cache.max_entries = max_entries;
    debug!(max_entries, "selector cache resized");
    match NonZeroUsize::new(max_entries) {
        Some(cap) => {
            if let Some(entries) = cache.entries.as_mut() {
                entries.resize(cap);
            }
        }
        None => cache.entries = None,
    }
}

/// Number of expressions currently cached
pub fn len() -> usize {
    lock().entries.as_ref().map_or(0, |e| e.len())
}

/// Compile `expr`, reusing a cached compilation when possible.
pub fn get_or_compile(expr: &str) -> Result<Arc<CompiledExpr>, String> {
    {
        let mut cache = lock();
        if !cache.active() {
            drop(cache);
            trace!(expr, "selector cache bypassed");
            return compiler::compile(expr).map(Arc::new);
        }
        if let Some(hit) = cache.entries.as_mut().and_then(|e| e.get(expr)) {
            trace!(expr, "selector cache hit");
            return Ok(Arc::clone(hit));
        }
    }

    let compiled = Arc::new(compiler::compile(expr)?);

    let mut cache = lock();
    if let Some(cap) = NonZeroUsize::new(cache.max_entries).filter(|_| cache.enabled) {
        cache
            .entries
            .get_or_insert_with(|| LruCache::new(cap))
            .put(expr.to_string(), Arc::clone(&compiled));
    }
    Ok(compiled)
}
