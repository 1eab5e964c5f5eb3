//! Per-file module resolution.
//!
//! ## Overview
//!
//! [`ModuleResolver`] decides which copy of the formatting library formats a
//! file. Candidates are tried in order:
//!
//! 1. An explicitly configured module path, or the project-local install
//!    found by the [`ManifestWalker`].
//! 2. A global install, when allowed, for the package manager the user
//!    picks through the [`ChoicePrompt`].
//! 3. The bundled module.
//!
//! Once a candidate path exists it is loaded (or taken from the module
//! cache) and validated. A candidate that fails to load or validate ends
//! resolution without falling back to the bundled module.
//!
//! ## Examples
//!
//! ```no_run
//! use fmtresolve_core::module::node::{NodeBridge, NodeModuleLoader};
//! use fmtresolve_core::module::ModuleLoader;
//! use fmtresolve_core::prompt::NoPrompt;
//! use fmtresolve_core::resolver::ModuleResolver;
//! use fmtresolve_core::settings::ResolverSettings;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let loader = Arc::new(NodeModuleLoader::new(NodeBridge::new()?));
//! let bundled = loader.load(Path::new("/opt/editor/bundled/prettier"))?;
//! let resolver = ModuleResolver::new("prettier", bundled, loader, Arc::new(NoPrompt));
//!
//! let settings = ResolverSettings::default();
//! if let Some(module) = resolver.get_instance(Path::new("/proj/src/a.js"), &settings).await? {
//!     println!("formatting with {:?}", module.version());
//! }
//! # Ok(())
//! # }
//! ```

use crate::cache::ResolverCaches;
use crate::error::ResolveError;
use crate::fs::{FileSystem, RealFileSystem};
use crate::global::{GlobalPathLocator, PackageManagerKind};
use crate::manifest::{ManifestWalker, NoBoundary, WalkBoundary};
use crate::module::{load_module, FormatterModule, ModuleLoader};
use crate::prompt::ChoicePrompt;
use crate::settings::ResolverSettings;
use crate::validate::{validate, Validation, MIN_FORMATTER_VERSION};
use crate::workspace::WorkspaceFolders;
use anyhow::Result;
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod config;

pub use config::{Document, ResolvedConfig};

/// Where a resolved module was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// An explicit path or a project-local install.
    Local,
    /// Under the global root of a package manager.
    Global,
    Bundled,
}

impl std::fmt::Display for ModuleOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ModuleOrigin::Local => "local",
            ModuleOrigin::Global => "global",
            ModuleOrigin::Bundled => "bundled",
        })
    }
}

/// Orchestrates lookup, loading, validation and caching of formatter modules.
pub struct ModuleResolver {
    package_name: String,
    bundled: Arc<dyn FormatterModule>,
    loader: Arc<dyn ModuleLoader>,
    prompt: Arc<dyn ChoicePrompt>,
    fs: Arc<dyn FileSystem>,
    boundary: Arc<dyn WalkBoundary>,
    walker: ManifestWalker,
    global: GlobalPathLocator,
    workspace: WorkspaceFolders,
    caches: ResolverCaches,
}

impl std::fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("package_name", &self.package_name)
            .field("bundled", &self.bundled)
            .field("workspace", &self.workspace)
            .field("caches", &self.caches)
            .finish_non_exhaustive()
    }
}

impl ModuleResolver {
    /// Creates a resolver for `package_name` on the real filesystem.
    pub fn new(
        package_name: impl Into<String>,
        bundled: Arc<dyn FormatterModule>,
        loader: Arc<dyn ModuleLoader>,
        prompt: Arc<dyn ChoicePrompt>,
    ) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let boundary: Arc<dyn WalkBoundary> = Arc::new(NoBoundary);
        Self {
            package_name: package_name.into(),
            bundled,
            loader,
            prompt,
            walker: ManifestWalker::with_boundary(fs.clone(), boundary.clone()),
            fs,
            boundary,
            global: GlobalPathLocator::default(),
            workspace: WorkspaceFolders::default(),
            caches: ResolverCaches::default(),
        }
    }

    /// Replaces the filesystem used for every probe.
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.walker = ManifestWalker::with_boundary(fs.clone(), self.boundary.clone());
        self.fs = fs;
        self
    }

    /// Stops manifest walks at directories `boundary` reports.
    pub fn with_walk_boundary(mut self, boundary: Arc<dyn WalkBoundary>) -> Self {
        self.walker = ManifestWalker::with_boundary(self.fs.clone(), boundary.clone());
        self.boundary = boundary;
        self
    }

    pub fn with_global_locator(mut self, global: GlobalPathLocator) -> Self {
        self.global = global;
        self
    }

    pub fn with_workspace(mut self, workspace: WorkspaceFolders) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// The module shipped with the host tool.
    pub fn bundled(&self) -> Arc<dyn FormatterModule> {
        Arc::clone(&self.bundled)
    }

    pub fn caches(&self) -> &ResolverCaches {
        &self.caches
    }

    /// Returns the module that should format `file`.
    ///
    /// `Ok(None)` means resolution failed in a way already reported through
    /// the log (broken local install, invalid or outdated module, or no local
    /// module while `only_use_local_version` is set).
    ///
    /// # Errors
    ///
    /// A failed global-root lookup for the package manager the user chose is
    /// propagated.
    pub async fn get_instance(
        &self,
        file: &Path,
        settings: &ResolverSettings,
    ) -> Result<Option<Arc<dyn FormatterModule>>> {
        let explicit = settings.explicit_module_path();

        let mut candidate = match self.local_candidate(file, explicit) {
            Ok(candidate) => candidate,
            Err(e) => {
                let attempted = e
                    .basedir()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_else(|| "package.json".to_string());
                info!("Attempted to determine module path from {}", attempted);
                error!(
                    "Failed to load module. If you have {} installed, \
                     run your package manager's install command: {}",
                    self.package_name, e
                );
                return Ok(None);
            }
        };

        // Local-only resolution never consults global installs.
        if candidate.is_none()
            && settings.resolve_global_modules
            && !settings.only_use_local_version
        {
            candidate = self.global_candidate().await?;
        }

        match candidate {
            Some(path) => Ok(self.load_candidate(&path, explicit.is_some())),
            None if settings.only_use_local_version => {
                info!(
                    "No local {} found and only local versions are allowed; skipping {}",
                    self.package_name,
                    file.display()
                );
                Ok(None)
            }
            None => {
                debug!("Using bundled {}", self.package_name);
                Ok(Some(self.bundled()))
            }
        }
    }

    fn local_candidate(
        &self,
        file: &Path,
        explicit: Option<&str>,
    ) -> Result<Option<PathBuf>, ResolveError> {
        match explicit {
            Some(explicit) => Ok(self.workspace.resolve_relative(file, explicit)),
            None => self
                .walker
                .find_package(&self.caches.paths, file, &self.package_name),
        }
    }

    async fn global_candidate(&self) -> Result<Option<PathBuf>> {
        let labels = PackageManagerKind::ALL.map(PackageManagerKind::as_str);
        let placeholder = format!(
            "Select the package manager used to install {} globally",
            self.package_name
        );

        let Some(kind) = self
            .prompt
            .choose(&placeholder, &labels)
            .await
            .and_then(|index| PackageManagerKind::ALL.get(index).copied())
        else {
            debug!("No package manager selected for global resolution");
            return Ok(None);
        };

        let Some(root) = self.global.global_root(kind)? else {
            return Ok(None);
        };
        let path = root.join(&self.package_name);
        if self.fs.exists(&path) {
            Ok(Some(path))
        } else {
            debug!("{} not installed under {}", self.package_name, root.display());
            Ok(None)
        }
    }

    fn load_candidate(&self, path: &Path, explicit: bool) -> Option<Arc<dyn FormatterModule>> {
        if let Some(cached) = self.caches.modules.get(path) {
            return Some(cached);
        }

        let module = load_module(self.loader.as_ref(), path)?;

        match validate(module.as_ref(), explicit) {
            Validation::InvalidShape => {
                error!(
                    "The configured module path {} does not point to a valid {} module",
                    path.display(),
                    self.package_name
                );
                None
            }
            Validation::OutdatedVersion => {
                info!("Attempted to load {} from {}", self.package_name, path.display());
                error!(
                    "Outdated {} version {}: at least {} is required",
                    self.package_name,
                    module.version().unwrap_or("unknown"),
                    MIN_FORMATTER_VERSION
                );
                None
            }
            Validation::Valid => {
                info!(
                    "Loaded {} {} from {}",
                    self.package_name,
                    module.version().unwrap_or("unknown"),
                    path.display()
                );
                Some(self.caches.modules.insert(path, module))
            }
        }
    }

    /// Reports where `module` came from.
    ///
    /// Returns `None` for an instance this resolver neither bundles nor
    /// caches.
    pub fn origin(&self, module: &Arc<dyn FormatterModule>) -> Option<ModuleOrigin> {
        if Arc::ptr_eq(module, &self.bundled) {
            return Some(ModuleOrigin::Bundled);
        }
        let (path, _) = self
            .caches
            .modules
            .modules()
            .into_iter()
            .find(|(_, cached)| Arc::ptr_eq(cached, module))?;

        let global = PackageManagerKind::ALL
            .iter()
            .filter_map(|kind| self.global.cached_root(*kind))
            .any(|root| path.starts_with(root));
        Some(if global {
            ModuleOrigin::Global
        } else {
            ModuleOrigin::Local
        })
    }

    /// Empties the path-resolution cache.
    pub fn clear_path_cache(&self) {
        self.caches.paths.clear();
    }

    /// Resets loaded module state.
    ///
    /// Clears the bundled module's config cache and that of every cached
    /// module, then empties the module cache. Per-module failures are logged.
    /// The path cache is left alone.
    pub fn dispose(&self) {
        if let Err(e) = self.bundled.clear_config_cache() {
            error!("Error clearing bundled module cache: {:#}", e);
        }
        for (path, module) in self.caches.modules.modules() {
            if let Err(e) = module.clear_config_cache() {
                error!("Error clearing module cache for {}: {:#}", path.display(), e);
            }
        }
        self.caches.modules.clear();
    }
}
