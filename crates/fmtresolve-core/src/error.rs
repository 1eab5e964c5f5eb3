use std::path::PathBuf;
use thiserror::Error;

/// Failure to locate the on-disk entry point of a package that was found
/// declared in a manifest or present in a `node_modules` directory.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No file under any `node_modules` above `basedir` satisfies the package.
    #[error("Cannot find module '{package}' from '{}'", basedir.display())]
    ModuleNotFound { package: String, basedir: PathBuf },

    /// The installed package's own `package.json` could not be parsed.
    #[error("Invalid package manifest at '{}': {source}", path.display())]
    InvalidPackageManifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ResolveError {
    /// Directory the failed resolution started from, when known.
    pub fn basedir(&self) -> Option<&std::path::Path> {
        match self {
            ResolveError::ModuleNotFound { basedir, .. } => Some(basedir),
            ResolveError::InvalidPackageManifest { .. } => None,
        }
    }
}

/// Failure to turn a resolved path into a live module instance.
#[derive(Debug, Error)]
#[error("Failed to load module at '{}'", path.display())]
pub struct LoadError {
    pub path: PathBuf,
    #[source]
    pub source: anyhow::Error,
}

impl LoadError {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}
