//! Filesystem probing abstraction.
//!
//! The walker, the global locator, and the resolver never touch `std::fs`
//! directly; they go through [`FileSystem`] so tests can substitute a
//! counting or fixture-backed implementation.

use std::io;
use std::path::Path;

/// Trait for the handful of filesystem probes resolution needs.
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists and is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Returns `true` if `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Returns `true` if anything exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    /// Reads the whole file at `path` as UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Default implementation of [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}
