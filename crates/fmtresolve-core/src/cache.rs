//! Resolution caches owned by a [`ModuleResolver`](crate::resolver::ModuleResolver).
//!
//! The two caches have different invalidation rules: [`PathCache`] maps a
//! starting path to an on-disk entry point and is only ever cleared as a
//! whole, while [`ModuleCache`] holds live module instances (which carry
//! their own mutable config caches) and is emptied on dispose.

use crate::module::FormatterModule;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `(starting path, package name) -> resolved entry path`.
#[derive(Debug, Default)]
pub struct PathCache {
    entries: DashMap<(PathBuf, String), PathBuf>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, start: &Path, package: &str) -> Option<PathBuf> {
        self.entries
            .get(&(start.to_path_buf(), package.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Records a resolution. An existing value for the key is kept.
    pub fn insert(&self, start: &Path, package: &str, resolved: PathBuf) -> PathBuf {
        self.entries
            .entry((start.to_path_buf(), package.to_string()))
            .or_insert(resolved)
            .value()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// `resolved module path -> loaded instance`.
#[derive(Default)]
pub struct ModuleCache {
    entries: DashMap<PathBuf, Arc<dyn FormatterModule>>,
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCache")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<Arc<dyn FormatterModule>> {
        self.entries.get(path).map(|entry| Arc::clone(entry.value()))
    }

    /// Caches `module` under `path` unless an instance is already present, and
    /// returns whichever instance ends up cached.
    pub fn insert(
        &self,
        path: &Path,
        module: Arc<dyn FormatterModule>,
    ) -> Arc<dyn FormatterModule> {
        Arc::clone(self.entries.entry(path.to_path_buf()).or_insert(module).value())
    }

    /// Snapshot of the cached instances, so callers never hold a shard lock
    /// while calling into a module.
    pub fn modules(&self) -> Vec<(PathBuf, Arc<dyn FormatterModule>)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Both caches, created together with the resolver that owns them.
#[derive(Debug, Default)]
pub struct ResolverCaches {
    pub paths: PathCache,
    pub modules: ModuleCache,
}
