//! Effective formatting options for a document.

use super::ModuleResolver;
use crate::module::{FormatOptions, FormatterModule, ResolveConfigOptions};
use crate::settings::ResolverSettings;
use anyhow::Result;
use log::{error, info};
use std::path::PathBuf;
use url::Url;

/// A document known to the host editor.
///
/// Only `file:` documents live on disk; everything else (unsaved buffers,
/// remote or generated content) is virtual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    uri: Url,
}

impl Document {
    pub fn new(uri: Url) -> Self {
        Self { uri }
    }

    /// A `file:` document for an absolute path.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        Url::from_file_path(path.into()).ok().map(Self::new)
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn is_virtual(&self) -> bool {
        self.uri.scheme() != "file"
    }

    /// The on-disk path, for non-virtual documents.
    pub fn file_path(&self) -> Option<PathBuf> {
        if self.is_virtual() {
            return None;
        }
        self.uri.to_file_path().ok()
    }
}

/// Outcome of config resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedConfig {
    /// Options merged from config files and editorconfig.
    Options(FormatOptions),
    /// No config applies; library defaults are used.
    NoConfig,
    /// A config file exists but could not be resolved.
    Error,
    /// A config file is required and none was found.
    Disabled,
}

impl ResolvedConfig {
    /// Options to format with, or `None` when the document must be skipped.
    pub fn format_options(&self) -> Option<FormatOptions> {
        match self {
            ResolvedConfig::Options(options) => Some(options.clone()),
            ResolvedConfig::NoConfig => Some(FormatOptions::new()),
            ResolvedConfig::Error | ResolvedConfig::Disabled => None,
        }
    }

    /// JSON rendering: the options object, `null`, `"error"` or `"disabled"`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ResolvedConfig::Options(options) => serde_json::Value::Object(options.clone()),
            ResolvedConfig::NoConfig => serde_json::Value::Null,
            ResolvedConfig::Error => serde_json::Value::from("error"),
            ResolvedConfig::Disabled => serde_json::Value::from("disabled"),
        }
    }
}

impl ModuleResolver {
    /// Resolves the options `module` would format `document` with.
    ///
    /// Virtual documents never touch the filesystem or the module and always
    /// come back as [`ResolvedConfig::NoConfig`].
    pub fn resolve_config(
        &self,
        module: &dyn FormatterModule,
        document: &Document,
        settings: &ResolverSettings,
    ) -> ResolvedConfig {
        let Some(path) = document.file_path() else {
            return ResolvedConfig::NoConfig;
        };

        let config = match settings.explicit_config_path() {
            Some(explicit) => self.workspace.resolve_relative(&path, explicit),
            None => match module.resolve_config_file(&path) {
                Ok(found) => found,
                Err(e) => {
                    error!(
                        "Error resolving formatter configuration for {}: {:#}",
                        path.display(),
                        e
                    );
                    return ResolvedConfig::Error;
                }
            },
        };

        let options = ResolveConfigOptions {
            config,
            editorconfig: settings.use_editor_config,
        };
        let resolved = match module.resolve_config(&path, &options) {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("Invalid formatter configuration file detected: {:#}", e);
                return ResolvedConfig::Error;
            }
        };

        if let Some(config) = &options.config {
            info!("Using config file at '{}'", config.display());
        }

        match resolved {
            Some(options) => ResolvedConfig::Options(options),
            None if settings.require_config => {
                info!("Require config set to true and no config present. Skipping file.");
                ResolvedConfig::Disabled
            }
            None => ResolvedConfig::NoConfig,
        }
    }

    /// Picks the module for `document` and resolves its config.
    ///
    /// Falls back to the bundled module when no other module resolves.
    ///
    /// # Errors
    ///
    /// Propagates a failed global-root lookup from
    /// [`get_instance`](ModuleResolver::get_instance).
    pub async fn get_resolved_config(
        &self,
        document: &Document,
        settings: &ResolverSettings,
    ) -> Result<ResolvedConfig> {
        let Some(path) = document.file_path() else {
            return Ok(self.resolve_config(self.bundled.as_ref(), document, settings));
        };

        let module = self
            .get_instance(&path, settings)
            .await?
            .unwrap_or_else(|| self.bundled());
        Ok(self.resolve_config(module.as_ref(), document, settings))
    }
}
