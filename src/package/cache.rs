//! On-disk cache layout.
//!
//! Every cached package version lives at
//! `<store_dir>/_<sanitized name>@<version>@<name>`. The scheme is shared with
//! earlier installs on disk, so it must not change.

use std::path::{Path, PathBuf};

/// Replace path separators in a package name with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Directory holding `name@version` inside `store_dir`.
///
/// Scoped names (`@scope/pkg`) keep their slash in the trailing segment, so
/// the package ends up one directory deeper than the prefix.
pub fn cache_location(store_dir: &Path, name: &str, version: &str) -> PathBuf {
    store_dir.join(format!("_{}@{}@{}", sanitize_name(name), version, name))
}

/// Sibling directory used to assemble a cache entry before it is moved into place.
pub fn staging_location(store_dir: &Path, name: &str, version: &str) -> PathBuf {
    store_dir.join(format!(".staging_{}@{}", sanitize_name(name), version))
}
