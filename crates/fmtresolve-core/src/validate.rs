//! Shape and version gate for freshly loaded modules.

use crate::module::{Capability, FormatterModule};
use semver::Version;

/// Oldest library release whose API surface the resolver relies on.
pub const MIN_FORMATTER_VERSION: Version = Version::new(1, 13, 0);

/// Capabilities that must all be present for an instance to be usable.
pub const REQUIRED_CAPABILITIES: [Capability; 4] = [
    Capability::Format,
    Capability::GetSupportInfo,
    Capability::GetFileInfo,
    Capability::ResolveConfig,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// Not the formatting library at all, at a path the user pointed us to.
    InvalidShape,
    /// Too old, or missing part of the required API surface.
    OutdatedVersion,
}

/// Checks `module` against the capability surface and [`MIN_FORMATTER_VERSION`].
///
/// A module without `format` is only reported as [`Validation::InvalidShape`]
/// when it was loaded from an explicitly configured path; otherwise it falls
/// through to the version check and comes out as
/// [`Validation::OutdatedVersion`].
pub fn validate(module: &dyn FormatterModule, explicit_path: bool) -> Validation {
    let has_format = module.has_capability(Capability::Format);
    if !has_format && explicit_path {
        return Validation::InvalidShape;
    }

    let complete = REQUIRED_CAPABILITIES
        .iter()
        .all(|capability| module.has_capability(*capability));
    if complete && meets_minimum(module.version()) {
        Validation::Valid
    } else {
        Validation::OutdatedVersion
    }
}

fn meets_minimum(version: Option<&str>) -> bool {
    let Some(version) = version else {
        return false;
    };
    match Version::parse(version.trim().trim_start_matches('v')) {
        Ok(parsed) => parsed >= MIN_FORMATTER_VERSION,
        Err(_) => false,
    }
}
