//! Node-style entry point lookup for a bare package name.
//!
//! Given a base directory this follows `require.resolve(name)` semantics:
//! every ancestor's `node_modules/<name>` is tried, first as a file, then as
//! a package directory (`main`, then `index`).

use crate::error::ResolveError;
use crate::fs::FileSystem;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 3] = ["js", "json", "node"];

#[derive(Debug, Default, Deserialize)]
struct PackageEntry {
    #[serde(default)]
    main: Option<String>,
}

/// Resolves the file `require(package)` would load from `basedir`.
pub fn resolve_package_entry(
    fs: &dyn FileSystem,
    package: &str,
    basedir: &Path,
) -> Result<PathBuf, ResolveError> {
    for dir in basedir.ancestors() {
        if dir.file_name().is_some_and(|name| name == "node_modules") {
            continue;
        }
        let candidate = dir.join("node_modules").join(package);
        if let Some(file) = load_as_file(fs, &candidate) {
            return Ok(file);
        }
        if let Some(file) = load_as_directory(fs, &candidate)? {
            return Ok(file);
        }
    }

    Err(ResolveError::ModuleNotFound {
        package: package.to_string(),
        basedir: basedir.to_path_buf(),
    })
}

fn with_extension_appended(path: &Path, extension: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(extension);
    PathBuf::from(raw)
}

fn load_as_file(fs: &dyn FileSystem, path: &Path) -> Option<PathBuf> {
    if fs.is_file(path) {
        return Some(path.to_path_buf());
    }
    EXTENSIONS
        .iter()
        .map(|ext| with_extension_appended(path, ext))
        .find(|candidate| fs.is_file(candidate))
}

fn load_index(fs: &dyn FileSystem, dir: &Path) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("index.{ext}")))
        .find(|candidate| fs.is_file(candidate))
}

fn load_as_directory(fs: &dyn FileSystem, dir: &Path) -> Result<Option<PathBuf>, ResolveError> {
    if !fs.is_dir(dir) {
        return Ok(None);
    }

    let manifest_path = dir.join("package.json");
    if fs.is_file(&manifest_path) {
        // An unreadable file is treated like a missing one; only bad JSON is fatal.
        if let Ok(raw) = fs.read_to_string(&manifest_path) {
            let entry: PackageEntry = serde_json::from_str(&raw).map_err(|source| {
                ResolveError::InvalidPackageManifest {
                    path: manifest_path.clone(),
                    source,
                }
            })?;
            if let Some(main) = entry.main.as_deref().filter(|m| !m.is_empty()) {
                let main_path = dir.join(main.trim_start_matches("./"));
                if let Some(file) =
                    load_as_file(fs, &main_path).or_else(|| load_index(fs, &main_path))
                {
                    return Ok(Some(file));
                }
            }
        }
    }

    Ok(load_index(fs, dir))
}
