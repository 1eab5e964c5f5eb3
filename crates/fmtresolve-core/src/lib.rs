//! # fmtresolve Core
//!
//! Formatter module resolution and caching for editor integrations.
//!
//! ## Overview
//!
//! Given a source file, this crate works out which installed copy of a
//! JavaScript formatting library should format it, and with which
//! configuration. A project-local install wins over a global one, which wins
//! over the copy bundled with the host tool. Candidates are version-checked
//! before use, and both resolved paths and loaded modules are cached.
//!
//! ## Modules
//!
//! - [`manifest`] - `package.json` discovery and package entry resolution
//! - [`global`] - Global install roots for npm, yarn and pnpm
//! - [`module`] - The formatter module capability surface and its loaders
//! - [`validate`] - Version and capability gate for loaded modules
//! - [`cache`] - Path and module caches owned by a resolver
//! - [`resolver`] - The orchestrator tying lookup, loading and config together
//!
//! ## Design Philosophy
//!
//! - **Explicit State**: Caches belong to a [`ModuleResolver`] instance, never to the process
//! - **Testability**: Filesystem, command execution, module loading and user prompts are traits
//! - **Fail Loudly on Broken Installs**: A found-but-broken module is never replaced by a fallback
//!
//! ## Examples
//!
//! ```no_run
//! use fmtresolve_core::module::node::{NodeBridge, NodeModuleLoader};
//! use fmtresolve_core::module::ModuleLoader;
//! use fmtresolve_core::prompt::NoPrompt;
//! use fmtresolve_core::{Document, ModuleResolver, ResolverSettings};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let loader = Arc::new(NodeModuleLoader::new(NodeBridge::new()?));
//! let bundled = loader.load(std::path::Path::new("/opt/editor/node_modules/prettier"))?;
//! let resolver = ModuleResolver::new("prettier", bundled, loader, Arc::new(NoPrompt));
//!
//! let document = Document::from_path("/proj/src/a.js").expect("absolute path");
//! let config = resolver
//!     .get_resolved_config(&document, &ResolverSettings::default())
//!     .await?;
//! println!("{}", config.to_json());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod exec;
pub mod fs;
pub mod global;
pub mod manifest;
pub mod module;
pub mod prompt;
pub mod resolver;
pub mod settings;
pub mod validate;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use error::{LoadError, ResolveError};
pub use module::{FormatterModule, ModuleLoader};
pub use resolver::{Document, ModuleOrigin, ModuleResolver, ResolvedConfig};
pub use settings::ResolverSettings;
