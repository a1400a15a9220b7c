//! Error taxonomy for package resolution and command dispatch.
//!
//! Engine functions return `anyhow::Result`; the variants below travel inside
//! those errors so callers can `downcast_ref::<EngineError>()` when they need
//! to react to a specific failure.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The registry could not be reached, timed out, or answered with a non-success status.
    #[error("Registry unavailable for {package}: {reason}")]
    RegistryUnavailable { package: String, reason: String },

    #[error("No published versions found for {0}")]
    NoPublishedVersions(String),

    #[error("Failed to install {package}@{version}: {reason}")]
    InstallFailed {
        package: String,
        version: String,
        reason: String,
    },

    #[error("Failed to update {package}: {reason}")]
    UpdateFailed { package: String, reason: String },

    #[error("No entry point declared by {package} (searched from {searched:?})")]
    EntryNotFound { package: String, searched: PathBuf },

    #[error("Unknown command '{name}'. Available commands: {available}")]
    UnknownCommand { name: String, available: String },

    /// A loaded command did not provide one of the required lifecycle phases.
    #[error("Command does not implement {0}")]
    NotImplemented(&'static str),

    #[error("Failed to start {program:?}: {reason}")]
    SpawnFailed { program: PathBuf, reason: String },

    #[error("pluck {required} or newer is required, running {current}")]
    VersionTooLow { required: String, current: String },

    #[error("Invalid invocation context: {0}")]
    InvalidInvocation(String),

    #[error("Unable to determine the user home directory")]
    HomeNotFound,
}

impl EngineError {
    /// Wrap any error chain as a registry failure for `package`.
    pub fn registry(package: &str, err: &anyhow::Error) -> Self {
        EngineError::RegistryUnavailable {
            package: package.to_string(),
            reason: format!("{:#}", err),
        }
    }
}

/// Returns the engine error carried by `err`, if any.
pub fn engine_error(err: &anyhow::Error) -> Option<&EngineError> {
    err.downcast_ref::<EngineError>()
}
