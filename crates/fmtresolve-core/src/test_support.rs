//! In-memory stand-ins shared by the unit tests.

use crate::error::LoadError;
use crate::module::{
    Capability, FileInfo, FormatOptions, FormatterModule, ModuleLoader, ResolveConfigOptions,
};
use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct FakeModule {
    pub version: Option<String>,
    pub capabilities: HashSet<Capability>,
    pub config_file: Option<PathBuf>,
    pub config: Option<FormatOptions>,
    pub fail_config: bool,
    pub fail_clear: bool,
    pub clear_calls: AtomicUsize,
    pub config_calls: Mutex<Vec<(PathBuf, ResolveConfigOptions)>>,
}

impl FakeModule {
    pub fn new(version: &str) -> Self {
        Self {
            version: Some(version.to_string()),
            capabilities: Capability::ALL.into_iter().collect(),
            config_file: None,
            config: None,
            fail_config: false,
            fail_clear: false,
            clear_calls: AtomicUsize::new(0),
            config_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without(mut self, capability: Capability) -> Self {
        self.capabilities.remove(&capability);
        self
    }

    pub fn clears(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

impl FormatterModule for FakeModule {
    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn format(&self, source: &str, _options: &FormatOptions) -> Result<String> {
        Ok(source.trim().to_string())
    }

    fn support_info(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "languages": [] }))
    }

    fn file_info(&self, _path: &Path, _ignore_path: Option<&Path>) -> Result<FileInfo> {
        Ok(FileInfo::default())
    }

    fn resolve_config_file(&self, _path: &Path) -> Result<Option<PathBuf>> {
        if self.fail_config {
            return Err(anyhow!("config search failed"));
        }
        Ok(self.config_file.clone())
    }

    fn resolve_config(
        &self,
        path: &Path,
        options: &ResolveConfigOptions,
    ) -> Result<Option<FormatOptions>> {
        self.config_calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), options.clone()));
        if self.fail_config {
            return Err(anyhow!("Unexpected token in .prettierrc"));
        }
        Ok(self.config.clone())
    }

    fn clear_config_cache(&self) -> Result<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_clear {
            return Err(anyhow!("clear failed"));
        }
        Ok(())
    }
}

/// Hands out a fresh [`FakeModule`] per load and counts loads.
#[derive(Debug)]
pub struct CountingLoader {
    pub version: String,
    pub fail: bool,
    pub loads: AtomicUsize,
}

impl CountingLoader {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            fail: false,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModuleLoader for CountingLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn FormatterModule>, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LoadError::new(path, anyhow!("SyntaxError: Unexpected token")));
        }
        Ok(Arc::new(FakeModule::new(&self.version)))
    }
}
