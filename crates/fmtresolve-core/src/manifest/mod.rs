//! Directory-walking dependency discovery.
//!
//! ## Overview
//!
//! [`ManifestWalker::find_package`] answers "which copy of `package` belongs
//! to this file?" the way a Node project would:
//!
//! 1. Start outside any `node_modules` tree the file may sit in.
//! 2. Walk up looking for a `package.json` that declares the package in
//!    `dependencies` or `devDependencies`. That directory is the resolution
//!    root.
//! 3. Failing that, walk up again looking for an installed
//!    `node_modules/<package>` directory.
//! 4. Resolve the entry file from the resolution root with
//!    [`entry::resolve_package_entry`].
//!
//! A declared dependency always wins over an installed copy, even one found
//! closer to the file. Successful resolutions are recorded in the
//! [`PathCache`] and never re-walked.
//!
//! ## Walk boundaries
//!
//! Test fixtures live inside real projects, so a walk may need to stop before
//! reaching the filesystem root. That decision is delegated to a
//! [`WalkBoundary`]; production code uses [`NoBoundary`].

use crate::cache::PathCache;
use crate::error::ResolveError;
use crate::fs::FileSystem;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub mod entry;

pub use entry::resolve_package_entry;

/// The parts of a `package.json` that dependency discovery reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub dependencies: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub dev_dependencies: Option<HashMap<String, serde_json::Value>>,
}

impl Manifest {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Whether `package` is a direct or development dependency.
    pub fn declares(&self, package: &str) -> bool {
        let listed = |deps: &Option<HashMap<String, serde_json::Value>>| {
            deps.as_ref()
                .and_then(|deps| deps.get(package))
                .is_some_and(|version| !version.is_null())
        };
        listed(&self.dependencies) || listed(&self.dev_dependencies)
    }
}

/// Decides whether an upward walk stops at a directory.
///
/// The directory itself is still inspected; the walk just does not continue
/// to its parent.
pub trait WalkBoundary: Send + Sync + std::fmt::Debug {
    fn is_boundary(&self, dir: &Path, fs: &dyn FileSystem) -> bool;
}

/// Walks all the way to the filesystem root.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBoundary;

impl WalkBoundary for NoBoundary {
    fn is_boundary(&self, _dir: &Path, _fs: &dyn FileSystem) -> bool {
        false
    }
}

/// Stops at any directory containing a marker file.
#[derive(Debug, Clone)]
pub struct MarkerFileBoundary {
    marker: String,
}

impl MarkerFileBoundary {
    pub const DEFAULT_MARKER: &'static str = ".fmtresolve-test-root";

    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for MarkerFileBoundary {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MARKER)
    }
}

impl WalkBoundary for MarkerFileBoundary {
    fn is_boundary(&self, dir: &Path, fs: &dyn FileSystem) -> bool {
        fs.exists(&dir.join(&self.marker))
    }
}

/// Cuts `path` at its first `node_modules` component, unless that component
/// directly follows the root.
pub fn outside_node_modules(path: &Path) -> PathBuf {
    let components: Vec<Component<'_>> = path.components().collect();
    let position = components
        .iter()
        .position(|c| matches!(c, Component::Normal(name) if *name == "node_modules"));

    match position {
        Some(index) if index > 1 => components[..index].iter().collect(),
        _ => path.to_path_buf(),
    }
}

/// Finds the installed copy of a package that governs a given path.
#[derive(Debug, Clone)]
pub struct ManifestWalker {
    fs: Arc<dyn FileSystem>,
    boundary: Arc<dyn WalkBoundary>,
}

impl ManifestWalker {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self::with_boundary(fs, Arc::new(NoBoundary))
    }

    pub fn with_boundary(fs: Arc<dyn FileSystem>, boundary: Arc<dyn WalkBoundary>) -> Self {
        Self { fs, boundary }
    }

    /// Resolves `package` for `start`.
    ///
    /// Returns `Ok(None)` when nothing declares or contains the package, and
    /// an error when a declaration or installed directory was found but its
    /// entry file could not be.
    pub fn find_package(
        &self,
        cache: &PathCache,
        start: &Path,
        package: &str,
    ) -> Result<Option<PathBuf>, ResolveError> {
        if let Some(cached) = cache.get(start, package) {
            return Ok(Some(cached));
        }

        let search_from = outside_node_modules(start);

        let root = self
            .walk_up(&search_from, |dir| self.declares_dependency(dir, package))
            .or_else(|| {
                self.walk_up(&search_from, |dir| {
                    self.fs.exists(&dir.join("node_modules").join(package))
                })
            });

        let Some(root) = root else {
            return Ok(None);
        };

        debug!("Resolving {} from {}", package, root.display());
        let resolved = resolve_package_entry(self.fs.as_ref(), package, &root)?;
        Ok(Some(cache.insert(start, package, resolved)))
    }

    fn walk_up(&self, from: &Path, mut matches: impl FnMut(&Path) -> bool) -> Option<PathBuf> {
        for dir in from.ancestors() {
            if dir.as_os_str().is_empty() {
                break;
            }
            if matches(dir) {
                return Some(dir.to_path_buf());
            }
            if self.boundary.is_boundary(dir, self.fs.as_ref()) {
                break;
            }
        }
        None
    }

    fn declares_dependency(&self, dir: &Path, package: &str) -> bool {
        let manifest_path = dir.join("package.json");
        if !self.fs.exists(&manifest_path) {
            return false;
        }
        // Unreadable or malformed manifests count as absent.
        self.fs
            .read_to_string(&manifest_path)
            .ok()
            .and_then(|raw| Manifest::parse(&raw).ok())
            .is_some_and(|manifest| manifest.declares(package))
    }
}
