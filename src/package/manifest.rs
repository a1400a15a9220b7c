//! Package manifest (`package.json`) lookup.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::runtime::{Runtime, format_path, path::resolve_relative_path};

pub const MANIFEST_FILE: &str = "package.json";

/// The subset of `package.json` the engine reads.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct Manifest {
    /// Entry point, relative to the manifest directory.
    #[serde(default)]
    pub main: Option<String>,
}

impl Manifest {
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(&content).with_context(|| format!("Invalid manifest at {:?}", path))
    }
}

/// Nearest directory at or above `start` that contains a manifest.
pub fn find_package_dir<R: Runtime>(runtime: &R, start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| runtime.exists(&dir.join(MANIFEST_FILE)))
        .map(Path::to_path_buf)
}

/// Absolute, forward-slash path of the entry point declared by the nearest manifest.
///
/// `Ok(None)` means there is no manifest or it declares no `main`; an
/// unreadable or malformed manifest is an error.
pub fn entry_point<R: Runtime>(runtime: &R, start: &Path) -> Result<Option<PathBuf>> {
    let Some(package_dir) = find_package_dir(runtime, start) else {
        debug!("No {} found at or above {:?}", MANIFEST_FILE, start);
        return Ok(None);
    };

    let manifest = Manifest::load(runtime, &package_dir.join(MANIFEST_FILE))?;
    let Some(main) = manifest.main.filter(|m| !m.trim().is_empty()) else {
        debug!("Manifest in {:?} declares no entry point", package_dir);
        return Ok(None);
    };

    let mut entry = resolve_relative_path(&package_dir, Path::new(&main));
    if entry.is_relative() {
        entry = resolve_relative_path(&runtime.current_dir()?, &entry);
    }
    Ok(Some(format_path(&entry)))
}
