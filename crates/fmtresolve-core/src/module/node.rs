//! Node-backed module loading.
//!
//! The formatting library is a JavaScript package, so "loading" it means
//! asking `node` to `require` the resolved path. Each call runs a short
//! bridge script: the module path and export name go on the command line,
//! JSON-encoded arguments go on stdin, and a JSON envelope comes back on
//! stdout. Anything the module itself prints is redirected to stderr so the
//! envelope stays the only thing on stdout.

use super::{
    Capability, FileInfo, FormatOptions, FormatterModule, ModuleLoader, ResolveConfigOptions,
};
use crate::error::LoadError;
use crate::exec::{CommandExecutor, RealCommandExecutor};
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Export name reserved for the load-time description request.
const DESCRIBE: &str = "__describe";

const BRIDGE_SCRIPT: &str = r#"
const [modulePath, method] = process.argv.slice(1);
const reply = process.stdout.write.bind(process.stdout);
process.stdout.write = process.stderr.write.bind(process.stderr);
console.log = console.info = console.debug = console.error;
let input = "";
process.stdin.setEncoding("utf8");
process.stdin.on("data", (chunk) => { input += chunk; });
process.stdin.on("end", async () => {
  try {
    const mod = require(modulePath);
    let result;
    if (method === "__describe") {
      result = {
        version: typeof mod.version === "string" ? mod.version : null,
        functions: Object.keys(mod).filter((key) => typeof mod[key] === "function"),
      };
    } else {
      const args = input ? JSON.parse(input) : [];
      result = await mod[method](...args);
    }
    reply(JSON.stringify({ ok: result === undefined ? null : result }));
  } catch (error) {
    reply(JSON.stringify({ err: String((error && error.stack) || error) }));
    process.exitCode = 1;
  }
});
"#;

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    ok: Option<Value>,
    #[serde(default)]
    err: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Description {
    version: Option<String>,
    #[serde(default)]
    functions: Vec<String>,
}

/// Runs single export calls of a module through `node`.
#[derive(Debug, Clone)]
pub struct NodeBridge {
    node: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl NodeBridge {
    /// Creates a bridge using the `node` found on `PATH`.
    pub fn new() -> Result<Self> {
        let node = which::which("node").context("node executable not found on PATH")?;
        Ok(Self::with_executor(node, Arc::new(RealCommandExecutor)))
    }

    /// Creates a bridge with a custom executor (for testing).
    pub fn with_executor(node: PathBuf, executor: Arc<dyn CommandExecutor>) -> Self {
        Self { node, executor }
    }

    /// Calls `module[method](...args)` and returns its JSON result.
    pub fn call(&self, module: &Path, method: &str, args: Value) -> Result<Value> {
        let module_arg = module.to_string_lossy().into_owned();
        let stdin = serde_json::to_vec(&args)?;
        let output = self.executor.execute(
            &self.node,
            &["-e", BRIDGE_SCRIPT, module_arg.as_str(), method],
            Some(stdin.as_slice()),
        )?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reply: Reply = serde_json::from_str(stdout.trim()).map_err(|e| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow!("Unreadable reply from node ({}): {}", e, stderr.trim())
        })?;

        if let Some(err) = reply.err {
            bail!("{}", err);
        }
        if !output.status.success() {
            bail!("node exited with {}", output.status);
        }
        Ok(reply.ok.unwrap_or(Value::Null))
    }
}

/// Production [`ModuleLoader`]: `require`s the path in `node`.
#[derive(Debug, Clone)]
pub struct NodeModuleLoader {
    bridge: NodeBridge,
}

impl NodeModuleLoader {
    pub fn new(bridge: NodeBridge) -> Self {
        Self { bridge }
    }
}

impl ModuleLoader for NodeModuleLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn FormatterModule>, LoadError> {
        let described = self
            .bridge
            .call(path, DESCRIBE, json!([]))
            .map_err(|e| LoadError::new(path, e))?;
        let description: Description =
            serde_json::from_value(described).map_err(|e| LoadError::new(path, e))?;

        debug!(
            "Loaded {} (version {})",
            path.display(),
            description.version.as_deref().unwrap_or("unknown")
        );

        Ok(Arc::new(NodeFormatterModule {
            path: path.to_path_buf(),
            version: description.version,
            functions: description.functions.into_iter().collect(),
            bridge: self.bridge.clone(),
        }))
    }
}

/// A formatting library instance living behind [`NodeBridge`].
#[derive(Debug)]
pub struct NodeFormatterModule {
    path: PathBuf,
    version: Option<String>,
    functions: HashSet<String>,
    bridge: NodeBridge,
}

impl NodeFormatterModule {
    fn invoke(&self, capability: Capability, args: Value) -> Result<Value> {
        let name = capability.export_name();
        if !self.functions.contains(name) {
            bail!("{} does not export {}", self.path.display(), name);
        }
        self.bridge.call(&self.path, name, args)
    }
}

impl FormatterModule for NodeFormatterModule {
    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn has_capability(&self, capability: Capability) -> bool {
        self.functions.contains(capability.export_name())
    }

    fn format(&self, source: &str, options: &FormatOptions) -> Result<String> {
        let formatted = self.invoke(Capability::Format, json!([source, options]))?;
        formatted
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("format returned a non-string value"))
    }

    fn support_info(&self) -> Result<Value> {
        self.invoke(Capability::GetSupportInfo, json!([]))
    }

    fn file_info(&self, path: &Path, ignore_path: Option<&Path>) -> Result<FileInfo> {
        let options = match ignore_path {
            Some(ignore) => json!({ "ignorePath": ignore }),
            None => json!({}),
        };
        let info = self.invoke(Capability::GetFileInfo, json!([path, options]))?;
        Ok(serde_json::from_value(info)?)
    }

    fn resolve_config_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        let found = self.invoke(Capability::ResolveConfigFile, json!([path]))?;
        Ok(found.as_str().map(PathBuf::from))
    }

    fn resolve_config(
        &self,
        path: &Path,
        options: &ResolveConfigOptions,
    ) -> Result<Option<FormatOptions>> {
        match self.invoke(Capability::ResolveConfig, json!([path, options]))? {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(Some(map)),
            other => bail!("resolveConfig returned {}", other),
        }
    }

    fn clear_config_cache(&self) -> Result<()> {
        self.invoke(Capability::ClearConfigCache, json!([]))?;
        Ok(())
    }
}
