//! Package registry abstraction.
//!
//! The engine only needs two things from a registry: the document listing a
//! package's published versions, and (through that document) where each
//! version's tarball lives. [`NpmRegistry`] speaks the npm registry protocol.

mod npm;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

pub use npm::{DEFAULT_REGISTRY, NpmRegistry, package_url};

/// Registry document for one package (`GET <registry>/<name>`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PackageDocument {
    #[serde(default)]
    pub name: Option<String>,
    /// Published versions keyed by version string. Keys are not validated here.
    #[serde(default)]
    pub versions: BTreeMap<String, VersionDocument>,
}

impl PackageDocument {
    /// Tarball URL published for `version`, if the registry lists one.
    pub fn tarball_url(&self, version: &str) -> Option<&str> {
        self.versions
            .get(version)
            .and_then(|v| v.dist.as_ref())
            .map(|d| d.tarball.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct VersionDocument {
    #[serde(default)]
    pub dist: Option<Dist>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Dist {
    pub tarball: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    /// Base URL of the registry.
    fn url(&self) -> &str;

    /// Fetch the package document.
    ///
    /// Network failures, timeouts and non-success statuses are reported as
    /// [`crate::error::EngineError::RegistryUnavailable`].
    async fn package(&self, name: &str) -> Result<PackageDocument>;
}
