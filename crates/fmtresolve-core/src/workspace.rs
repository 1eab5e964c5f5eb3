//! Workspace folders and workspace-relative settings paths.

use std::path::{Path, PathBuf};

/// The set of root folders open in the host editor.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFolders {
    folders: Vec<PathBuf>,
}

impl WorkspaceFolders {
    pub fn new(folders: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            folders: folders.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// The innermost folder containing `path`.
    pub fn folder_for(&self, path: &Path) -> Option<&Path> {
        self.folders
            .iter()
            .filter(|folder| path.starts_with(folder))
            .max_by_key(|folder| folder.components().count())
            .map(PathBuf::as_path)
    }

    /// Resolves a user-supplied path for `document`.
    ///
    /// A leading `~` expands to the home directory, absolute paths are used
    /// as-is, and relative paths are joined onto the document's workspace
    /// folder. A relative path for a document outside every folder does not
    /// resolve.
    pub fn resolve_relative(&self, document: &Path, target: &str) -> Option<PathBuf> {
        let expanded = expand_home(target);
        if expanded.is_absolute() {
            return Some(expanded);
        }
        self.folder_for(document).map(|folder| folder.join(expanded))
    }
}

fn expand_home(target: &str) -> PathBuf {
    let rest = match target.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return PathBuf::from(target),
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(target),
    }
}
