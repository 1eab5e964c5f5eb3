//! The formatting-library capability surface and how instances are loaded.
//!
//! A [`FormatterModule`] is an opaque, already-loaded copy of the formatting
//! library. The resolver never formats anything itself; it only decides
//! *which* instance to hand out and checks that the instance is usable.
//!
//! Instances come from a [`ModuleLoader`]. The production loader is
//! [`node::NodeModuleLoader`], which drives a JavaScript module through a
//! `node` child process; tests substitute fixture loaders.

use crate::error::LoadError;
use anyhow::Result;
use log::error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod node;

/// Effective formatting options, as produced by the library's config resolution.
pub type FormatOptions = serde_json::Map<String, serde_json::Value>;

/// A single entry of the library's API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Format,
    GetSupportInfo,
    GetFileInfo,
    ResolveConfig,
    ResolveConfigFile,
    ClearConfigCache,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Format,
        Capability::GetSupportInfo,
        Capability::GetFileInfo,
        Capability::ResolveConfig,
        Capability::ResolveConfigFile,
        Capability::ClearConfigCache,
    ];

    /// The exported function name for this capability.
    pub fn export_name(self) -> &'static str {
        match self {
            Capability::Format => "format",
            Capability::GetSupportInfo => "getSupportInfo",
            Capability::GetFileInfo => "getFileInfo",
            Capability::ResolveConfig => "resolveConfig",
            Capability::ResolveConfigFile => "resolveConfigFile",
            Capability::ClearConfigCache => "clearConfigCache",
        }
    }
}

/// Result of the library's file-info query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub inferred_parser: Option<String>,
}

/// Options for the library's config resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveConfigOptions {
    /// Explicit config file; the library searches itself when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
    /// Whether `.editorconfig` settings are merged in.
    pub editorconfig: bool,
}

/// A loaded copy of the formatting library.
///
/// Every query beyond [`format`](Self::format) may be missing on old
/// releases; [`has_capability`](Self::has_capability) reports what the
/// instance actually exports. Calling a missing capability returns an error.
pub trait FormatterModule: Send + Sync + std::fmt::Debug {
    /// The library's self-reported version string.
    fn version(&self) -> Option<&str>;

    /// Whether the instance exports `capability`.
    fn has_capability(&self, capability: Capability) -> bool;

    /// Formats `source` with `options`.
    fn format(&self, source: &str, options: &FormatOptions) -> Result<String>;

    /// Languages, parsers and options the instance supports.
    fn support_info(&self) -> Result<serde_json::Value>;

    /// Whether `path` is ignored and which parser would handle it.
    fn file_info(&self, path: &Path, ignore_path: Option<&Path>) -> Result<FileInfo>;

    /// Locates the config file governing `path`, if any.
    fn resolve_config_file(&self, path: &Path) -> Result<Option<PathBuf>>;

    /// Merges file-based and editorconfig settings for `path`.
    fn resolve_config(
        &self,
        path: &Path,
        options: &ResolveConfigOptions,
    ) -> Result<Option<FormatOptions>>;

    /// Drops the instance's internal config-resolution cache.
    fn clear_config_cache(&self) -> Result<()>;
}

/// Turns a resolved filesystem path into a live module instance.
pub trait ModuleLoader: Send + Sync + std::fmt::Debug {
    fn load(&self, path: &Path) -> Result<Arc<dyn FormatterModule>, LoadError>;
}

/// Loads `path`, converting any failure into `None` after logging it.
pub fn load_module(loader: &dyn ModuleLoader, path: &Path) -> Option<Arc<dyn FormatterModule>> {
    match loader.load(path) {
        Ok(module) => Some(module),
        Err(e) => {
            error!("{}: {:#}", e, e.source);
            None
        }
    }
}
