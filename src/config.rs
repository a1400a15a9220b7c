use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;
use crate::http::DEFAULT_QUERY_TIMEOUT;
use crate::registry::DEFAULT_REGISTRY;
use crate::runtime::{Runtime, normalize_path, path::resolve_relative_path};

/// Directory under the user's home used when no home is configured.
pub const DEFAULT_CLI_HOME: &str = ".pluck";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Settings for one CLI invocation, built once in `main`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of everything pluck writes.
    pub home: PathBuf,
    /// Run the command from a package directory on disk instead of the registry.
    pub target_path: Option<PathBuf>,
    pub registry: String,
    pub query_timeout: Duration,
    pub debug: bool,
    /// Log filter, also handed to the entry stub.
    pub log_level: String,
    pub update_check: bool,
}

impl Config {
    pub fn new(home: PathBuf) -> Self {
        Self {
            home,
            target_path: None,
            registry: DEFAULT_REGISTRY.to_string(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            debug: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            update_check: true,
        }
    }

    /// Install root for registry packages.
    pub fn dependencies_dir(&self) -> PathBuf {
        self.home.join("dependencies")
    }

    /// Where cached package versions live.
    pub fn store_dir(&self) -> PathBuf {
        self.dependencies_dir().join("store")
    }

    /// Effective log filter: `debug` when the debug flag is set.
    pub fn effective_log_level(&self) -> &str {
        if self.debug { "debug" } else { &self.log_level }
    }
}

/// `path` anchored at the current directory when it is relative.
pub fn absolute_path<R: Runtime>(runtime: &R, path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize_path(path));
    }
    Ok(resolve_relative_path(&runtime.current_dir()?, path))
}

/// Home directory: `explicit` if given, else `<user home>/<cli_home_name>`.
/// Always absolute.
pub fn resolve_home<R: Runtime>(
    runtime: &R,
    explicit: Option<PathBuf>,
    cli_home_name: Option<&str>,
) -> Result<PathBuf> {
    if let Some(home) = explicit {
        return absolute_path(runtime, &home);
    }
    let user_home = runtime.home_dir().ok_or(EngineError::HomeNotFound)?;
    let home = absolute_path(runtime, &user_home.join(cli_home_name.unwrap_or(DEFAULT_CLI_HOME)))?;
    debug!("Using home directory {:?}", home);
    Ok(home)
}
