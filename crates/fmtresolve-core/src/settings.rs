//! Per-document resolution settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings consumed by module and config resolution.
///
/// Field names follow the editor's camelCase JSON; missing fields take their
/// defaults, so an empty object is a valid settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverSettings {
    /// Explicit module path, absolute or relative to the workspace folder.
    pub prettier_path: Option<String>,
    /// Allow falling back to a globally installed module.
    pub resolve_global_modules: bool,
    /// Never fall back to the bundled module.
    pub only_use_local_version: bool,
    /// Explicit config file, absolute or relative to the workspace folder.
    pub config_path: Option<String>,
    pub use_editor_config: bool,
    /// Skip documents that have no config file.
    pub require_config: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            prettier_path: None,
            resolve_global_modules: false,
            only_use_local_version: false,
            config_path: None,
            use_editor_config: true,
            require_config: false,
        }
    }
}

impl ResolverSettings {
    /// Loads settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// The explicit module path, ignoring empty strings.
    pub fn explicit_module_path(&self) -> Option<&str> {
        non_empty(self.prettier_path.as_deref())
    }

    /// The explicit config path, ignoring empty strings.
    pub fn explicit_config_path(&self) -> Option<&str> {
        non_empty(self.config_path.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
