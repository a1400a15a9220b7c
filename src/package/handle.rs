//! A single versioned package and its local copy.

use anyhow::Result;
use log::{debug, info};
use std::path::{Path, PathBuf};

use super::cache::cache_location;
use super::manifest::entry_point;
use super::version::{LATEST, VersionResolver};
use crate::error::EngineError;
use crate::install::{Installer, PackageRequest};
use crate::runtime::Runtime;

/// Which package a command runs, and at which version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    /// `latest` or an exact version.
    pub version: String,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

enum Origin<'a> {
    /// A package already on disk at `target_path`.
    Local,
    /// A package resolved through a registry and cached in `store_dir`.
    Registry {
        store_dir: PathBuf,
        resolver: VersionResolver<'a>,
        installer: &'a dyn Installer,
    },
}

pub struct PackageHandle<'a, R: Runtime> {
    runtime: &'a R,
    spec: PackageSpec,
    target_path: PathBuf,
    origin: Origin<'a>,
}

impl<'a, R: Runtime> PackageHandle<'a, R> {
    /// Handle for a package developed in place at `target_path`.
    pub fn local(runtime: &'a R, spec: PackageSpec, target_path: PathBuf) -> Self {
        Self {
            runtime,
            spec,
            target_path,
            origin: Origin::Local,
        }
    }

    /// Handle for a package fetched from a registry into `store_dir`.
    pub fn registry(
        runtime: &'a R,
        spec: PackageSpec,
        target_path: PathBuf,
        store_dir: PathBuf,
        resolver: VersionResolver<'a>,
        installer: &'a dyn Installer,
    ) -> Self {
        Self {
            runtime,
            spec,
            target_path,
            origin: Origin::Registry {
                store_dir,
                resolver,
                installer,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn version(&self) -> &str {
        &self.spec.version
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn store_dir(&self) -> Option<&Path> {
        match &self.origin {
            Origin::Local => None,
            Origin::Registry { store_dir, .. } => Some(store_dir),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.origin, Origin::Local)
    }

    /// Make sure the store exists and pin `latest` to a concrete version.
    #[tracing::instrument(skip(self), fields(package = %self.spec.name))]
    pub async fn resolve_version(&mut self) -> Result<()> {
        let Origin::Registry {
            store_dir,
            resolver,
            ..
        } = &self.origin
        else {
            return Ok(());
        };

        if !self.runtime.exists(store_dir) {
            self.runtime.create_dir_all(store_dir)?;
        }

        if self.spec.version == LATEST {
            let latest = resolver
                .latest(&self.spec.name)
                .await?
                .ok_or_else(|| EngineError::NoPublishedVersions(self.spec.name.clone()))?;
            debug!("Resolved {}@{} to {}", self.spec.name, LATEST, latest);
            self.spec.version = latest.to_string();
        }
        Ok(())
    }

    /// Whether a local copy of the package is present.
    pub async fn exists(&mut self) -> Result<bool> {
        if self.is_local() {
            return Ok(self.runtime.exists(&self.target_path));
        }
        self.resolve_version().await?;
        Ok(self
            .cache_file_path()
            .is_some_and(|path| self.runtime.exists(&path)))
    }

    /// Install the resolved version into the store.
    #[tracing::instrument(skip(self), fields(package = %self.spec.name))]
    pub async fn install(&mut self) -> Result<()> {
        self.resolve_version().await?;
        let Origin::Registry {
            store_dir,
            resolver,
            installer,
        } = &self.origin
        else {
            debug!("{} is a local package, nothing to install", self.spec.name);
            return Ok(());
        };

        info!("Installing {}@{}", self.spec.name, self.spec.version);
        installer
            .install(
                &self.target_path,
                store_dir,
                resolver.registry_url(),
                &[PackageRequest::new(&self.spec.name, &self.spec.version)],
            )
            .await
            .map_err(|e| EngineError::InstallFailed {
                package: self.spec.name.clone(),
                version: self.spec.version.clone(),
                reason: format!("{:#}", e),
            })?;
        Ok(())
    }

    /// Move to the newest published version, installing it unless already cached.
    #[tracing::instrument(skip(self), fields(package = %self.spec.name))]
    pub async fn update(&mut self) -> Result<()> {
        let Origin::Registry {
            store_dir,
            resolver,
            installer,
        } = &self.origin
        else {
            return Ok(());
        };

        let update_failed = |reason: String| EngineError::UpdateFailed {
            package: self.spec.name.clone(),
            reason,
        };

        let latest = resolver
            .latest(&self.spec.name)
            .await
            .map_err(|e| update_failed(format!("{:#}", e)))?
            .ok_or_else(|| update_failed("no published versions".to_string()))?
            .to_string();

        let cached = cache_location(store_dir, &self.spec.name, &latest);
        if self.runtime.exists(&cached) {
            debug!("{}@{} is already cached", self.spec.name, latest);
        } else {
            info!("Updating {} to {}", self.spec.name, latest);
            installer
                .install(
                    &self.target_path,
                    store_dir,
                    resolver.registry_url(),
                    &[PackageRequest::new(&self.spec.name, &latest)],
                )
                .await
                .map_err(|e| update_failed(format!("{:#}", e)))?;
        }

        self.spec.version = latest;
        Ok(())
    }

    /// Cache location for the current version; `None` for local packages.
    pub fn cache_file_path(&self) -> Option<PathBuf> {
        match &self.origin {
            Origin::Local => None,
            Origin::Registry { store_dir, .. } => Some(cache_location(
                store_dir,
                &self.spec.name,
                &self.spec.version,
            )),
        }
    }

    /// Entry point declared by the package manifest, if any.
    pub fn root_file_path(&self) -> Result<Option<PathBuf>> {
        let dir = self
            .cache_file_path()
            .unwrap_or_else(|| self.target_path.clone());
        entry_point(self.runtime, &dir)
    }
}
