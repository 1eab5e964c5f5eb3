//! Global install roots for npm, yarn and pnpm.
//!
//! ## Overview
//!
//! When a file has no project-local formatter, the resolver may fall back to
//! a globally installed copy. Where "global" lives depends on the package
//! manager the user picked, so each [`PackageManagerKind`] has its own
//! [`GlobalRootStrategy`], and [`GlobalPathLocator`] memoizes the answer per
//! kind.
//!
//! ## Architecture
//!
//! The design uses the **Strategy pattern** with dependency injection for testability:
//!
//! ```text
//! ┌───────────────────┐
//! │ GlobalPathLocator │  ← memoizing facade, one OnceCell per kind
//! └─────────┬─────────┘
//!           │
//!           │ Box<dyn GlobalRootStrategy>
//!           ▼
//! ┌────────────────────┐
//! │ GlobalRootStrategy │  ← Trait defining one lookup
//! │   (trait)          │
//! └─────────┬──────────┘
//!           │
//!    ┌──────┴───────┬────────────────┐
//!    │              │                │
//! NpmPrefixProbe YarnPrefixProbe PnpmRootCommand
//! ```
//!
//! npm and yarn are located by probing environment variables, rc files and
//! well-known directories (captured in a [`ProbeEnvironment`]). pnpm is
//! asked directly with `pnpm root -g` through a
//! [`CommandExecutor`](crate::exec::CommandExecutor).
//!
//! ## Examples
//!
//! ```no_run
//! use fmtresolve_core::global::{GlobalPathLocator, PackageManagerKind};
//!
//! let locator = GlobalPathLocator::new();
//! if let Some(root) = locator.global_root(PackageManagerKind::Npm)? {
//!     println!("npm installs globals under {}", root.display());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::exec::{CommandExecutor, RealCommandExecutor};
use crate::fs::{FileSystem, RealFileSystem};
use anyhow::{anyhow, Result};
use log::{debug, info};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A supported package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManagerKind {
    /// All kinds, in the order they are offered to the user.
    pub const ALL: [PackageManagerKind; 3] = [
        PackageManagerKind::Npm,
        PackageManagerKind::Yarn,
        PackageManagerKind::Pnpm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PackageManagerKind::Npm => "npm",
            PackageManagerKind::Yarn => "yarn",
            PackageManagerKind::Pnpm => "pnpm",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PackageManagerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        PackageManagerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("Unknown package manager: {}", s))
    }
}

/// Environment inputs consulted by the probing strategies.
#[derive(Debug, Clone, Default)]
pub struct ProbeEnvironment {
    pub home: Option<PathBuf>,
    /// `npm_config_prefix`, matched case-insensitively.
    pub npm_config_prefix: Option<PathBuf>,
    /// `PREFIX`.
    pub prefix: Option<PathBuf>,
    /// `APPDATA` (Windows).
    pub app_data: Option<PathBuf>,
    /// `LOCALAPPDATA` (Windows).
    pub local_app_data: Option<PathBuf>,
    /// The `node` executable, used to derive npm's default prefix.
    pub node_executable: Option<PathBuf>,
    pub windows: bool,
}

impl ProbeEnvironment {
    /// Captures the current process environment.
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);
        let npm_config_prefix = std::env::vars_os()
            .filter(|(key, _)| key.to_string_lossy().eq_ignore_ascii_case("npm_config_prefix"))
            .map(|(_, value)| value)
            .last()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            home: dirs::home_dir(),
            npm_config_prefix,
            prefix: var("PREFIX"),
            app_data: var("APPDATA"),
            local_app_data: var("LOCALAPPDATA"),
            node_executable: which::which("node").ok(),
            windows: cfg!(windows),
        }
    }

    /// Where npm would be installed with no configuration at all.
    fn default_npm_prefix(&self) -> Option<PathBuf> {
        let node = self.node_executable.as_deref()?;
        let bin_dir = node.parent()?;
        if self.windows {
            Some(bin_dir.to_path_buf())
        } else {
            bin_dir.parent().map(Path::to_path_buf)
        }
    }
}

/// Reads the `prefix` key of an npmrc file.
fn read_npmrc_prefix(fs: &dyn FileSystem, path: &Path) -> Option<PathBuf> {
    let raw = fs.read_to_string(path).ok()?;
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with(';') && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| key.trim() == "prefix")
        .map(|(_, value)| value.trim().trim_matches('"').trim_matches('\''))
        .last()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Resolves npm's global prefix.
fn npm_prefix(env: &ProbeEnvironment, fs: &dyn FileSystem) -> Option<PathBuf> {
    if let Some(prefix) = &env.npm_config_prefix {
        return Some(prefix.clone());
    }
    if let Some(prefix) = env
        .home
        .as_ref()
        .and_then(|home| read_npmrc_prefix(fs, &home.join(".npmrc")))
    {
        return Some(prefix);
    }
    if let Some(prefix) = &env.prefix {
        return Some(prefix.clone());
    }
    let default_prefix = env.default_npm_prefix();
    if let Some(prefix) = default_prefix
        .as_ref()
        .and_then(|p| read_npmrc_prefix(fs, &p.join("etc").join("npmrc")))
    {
        return Some(prefix);
    }
    if env.windows {
        if let Some(app_data) = &env.app_data {
            return Some(app_data.join("npm"));
        }
    }
    default_prefix
}

/// Trait for one package manager's global-root lookup.
pub trait GlobalRootStrategy: std::fmt::Debug + Send + Sync {
    /// The package manager this strategy answers for.
    fn kind(&self) -> PackageManagerKind;

    /// Computes the directory global packages are installed into.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails (e.g. the package manager
    /// cannot be run). Not finding a root is `Ok(None)`.
    fn global_root(&self) -> Result<Option<PathBuf>>;
}

/// npm: `<prefix>/lib/node_modules`, or `<prefix>/node_modules` on Windows.
#[derive(Debug)]
pub struct NpmPrefixProbe {
    env: ProbeEnvironment,
    fs: Arc<dyn FileSystem>,
}

impl NpmPrefixProbe {
    pub fn new(env: ProbeEnvironment, fs: Arc<dyn FileSystem>) -> Self {
        Self { env, fs }
    }
}

impl GlobalRootStrategy for NpmPrefixProbe {
    fn kind(&self) -> PackageManagerKind {
        PackageManagerKind::Npm
    }

    fn global_root(&self) -> Result<Option<PathBuf>> {
        let Some(prefix) = npm_prefix(&self.env, self.fs.as_ref()) else {
            return Ok(None);
        };
        Ok(Some(if self.env.windows {
            prefix.join("node_modules")
        } else {
            prefix.join("lib").join("node_modules")
        }))
    }
}

/// yarn (classic): `<prefix>/global/node_modules`.
#[derive(Debug)]
pub struct YarnPrefixProbe {
    env: ProbeEnvironment,
    fs: Arc<dyn FileSystem>,
}

impl YarnPrefixProbe {
    pub fn new(env: ProbeEnvironment, fs: Arc<dyn FileSystem>) -> Self {
        Self { env, fs }
    }

    fn windows_directory(&self) -> Option<PathBuf> {
        if !self.env.windows {
            return None;
        }
        let dir = self.env.local_app_data.as_ref()?.join("Yarn");
        self.fs.exists(&dir).then_some(dir)
    }
}

impl GlobalRootStrategy for YarnPrefixProbe {
    fn kind(&self) -> PackageManagerKind {
        PackageManagerKind::Yarn
    }

    fn global_root(&self) -> Result<Option<PathBuf>> {
        let windows_dir = self.windows_directory();
        let home_candidate = |relative: &str| {
            self.env
                .home
                .as_ref()
                .map(|home| home.join(relative))
                .filter(|dir| self.fs.exists(dir))
        };

        let prefix = self
            .env
            .prefix
            .clone()
            .or_else(|| windows_dir.clone())
            .or_else(|| home_candidate(".config/yarn"))
            .or_else(|| home_candidate(".yarn-config"))
            .or_else(|| npm_prefix(&self.env, self.fs.as_ref()));

        let subdir = if windows_dir.is_some() {
            Path::new("Data").join("global").join("node_modules")
        } else {
            Path::new("global").join("node_modules")
        };
        Ok(prefix.map(|prefix| prefix.join(subdir)))
    }
}

/// pnpm: asks `pnpm root -g`.
#[derive(Debug)]
pub struct PnpmRootCommand {
    program: PathBuf,
    executor: Box<dyn CommandExecutor>,
}

impl PnpmRootCommand {
    /// Creates a lookup using the `pnpm` found on `PATH` (or plain `pnpm`).
    pub fn new() -> Self {
        let program = which::which("pnpm").unwrap_or_else(|_| PathBuf::from("pnpm"));
        Self::with_executor(program, Box::new(RealCommandExecutor))
    }

    /// Creates a lookup with a custom executor (for testing).
    pub fn with_executor(program: PathBuf, executor: Box<dyn CommandExecutor>) -> Self {
        Self { program, executor }
    }
}

impl Default for PnpmRootCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalRootStrategy for PnpmRootCommand {
    fn kind(&self) -> PackageManagerKind {
        PackageManagerKind::Pnpm
    }

    fn global_root(&self) -> Result<Option<PathBuf>> {
        let output = self.executor.execute(&self.program, &["root", "-g"], None)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("pnpm root -g failed: {}", stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let root = stdout.trim();
        Ok((!root.is_empty()).then(|| PathBuf::from(root)))
    }
}

/// Memoizing facade over the per-kind strategies.
///
/// A successful lookup is computed once per kind and reused for the lifetime
/// of the locator, even if the environment changes afterwards. Failed lookups
/// are not memoized.
#[derive(Debug)]
pub struct GlobalPathLocator {
    strategies: Vec<Box<dyn GlobalRootStrategy>>,
    roots: [OnceCell<Option<PathBuf>>; 3],
}

impl Default for GlobalPathLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalPathLocator {
    /// Creates a locator probing the current process environment.
    pub fn new() -> Self {
        let env = ProbeEnvironment::from_process();
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let strategies: Vec<Box<dyn GlobalRootStrategy>> = vec![
            Box::new(NpmPrefixProbe::new(env.clone(), fs.clone())),
            Box::new(YarnPrefixProbe::new(env, fs)),
            Box::new(PnpmRootCommand::new()),
        ];
        Self::with_strategies(strategies)
    }

    /// Creates a locator with specific strategies (useful for testing).
    ///
    /// When two strategies answer for the same kind, the first one wins.
    pub fn with_strategies(strategies: Vec<Box<dyn GlobalRootStrategy>>) -> Self {
        Self {
            strategies,
            roots: Default::default(),
        }
    }

    /// The memoized root for `kind`, without running any lookup.
    pub fn cached_root(&self, kind: PackageManagerKind) -> Option<&Path> {
        self.roots[kind.index()].get()?.as_deref()
    }

    /// Returns the global root for `kind`, computing it on first use.
    ///
    /// # Errors
    ///
    /// Propagates the strategy's error, or fails if no strategy is
    /// registered for `kind`.
    pub fn global_root(&self, kind: PackageManagerKind) -> Result<Option<PathBuf>> {
        self.roots[kind.index()]
            .get_or_try_init(|| {
                let strategy = self
                    .strategies
                    .iter()
                    .find(|strategy| strategy.kind() == kind)
                    .ok_or_else(|| anyhow!("No global root lookup registered for {}", kind))?;
                let root = strategy.global_root()?;
                match &root {
                    Some(path) => info!("Global {} root: {}", kind, path.display()),
                    None => debug!("No global {} root found", kind),
                }
                Ok::<_, anyhow::Error>(root)
            })
            .cloned()
    }
}
