//! Install primitive: fetch a published tarball and unpack it into the cache.
//!
//! Each package is downloaded into the store, extracted into a sibling staging
//! directory and renamed onto its cache location, so the cache location either
//! holds a complete package or does not exist.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::{
    archive::ArchiveExtractor,
    cleanup::{self, CleanupGuard, SharedCleanupContext},
    download::download_file,
    http::HttpClient,
    package::cache::{cache_location, sanitize_name, staging_location},
    registry::{NpmRegistry, Registry},
    runtime::Runtime,
};

/// One `(name, exact version)` pair to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    pub name: String,
    pub version: String,
}

impl PackageRequest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install every package in `packages` into `store_dir` from `registry_url`.
    async fn install(
        &self,
        root_dir: &Path,
        store_dir: &Path,
        registry_url: &str,
        packages: &[PackageRequest],
    ) -> Result<()>;
}

/// Installs tarballs published on an npm-compatible registry.
pub struct RegistryInstaller<'a, R: Runtime, E: ArchiveExtractor> {
    runtime: &'a R,
    http_client: HttpClient,
    extractor: E,
}

impl<'a, R: Runtime + 'static, E: ArchiveExtractor> RegistryInstaller<'a, R, E> {
    pub fn new(runtime: &'a R, http_client: HttpClient, extractor: E) -> Self {
        Self {
            runtime,
            http_client,
            extractor,
        }
    }

    #[tracing::instrument(skip(self, registry, store_dir))]
    async fn install_package(
        &self,
        registry: &dyn Registry,
        store_dir: &Path,
        package: &PackageRequest,
    ) -> Result<()> {
        let target = cache_location(store_dir, &package.name, &package.version);
        if self.runtime.exists(&target) {
            info!(
                "{}@{} is already installed at {:?}",
                package.name, package.version, target
            );
            return Ok(());
        }

        let document = registry.package(&package.name).await?;
        let tarball_url = document.tarball_url(&package.version).ok_or_else(|| {
            anyhow!(
                "Registry has no tarball for {}@{}",
                package.name,
                package.version
            )
        })?;
        if !self.extractor.can_handle(Path::new(tarball_url)) {
            return Err(anyhow!(
                "Unsupported archive format for {}@{}: {}",
                package.name,
                package.version,
                tarball_url
            ));
        }

        let cleanup_ctx = cleanup::new_shared();
        let cleanup_ctx_clone = Arc::clone(&cleanup_ctx);

        let ctrl_c_handler = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted, cleaning up...");
                if let Ok(mut ctx) = cleanup_ctx_clone.lock() {
                    ctx.cleanup();
                }
                std::process::exit(130);
            }
        });

        let result = self
            .unpack_into_place(store_dir, package, tarball_url, &target, cleanup_ctx)
            .await;

        ctrl_c_handler.abort();
        result
    }

    async fn unpack_into_place(
        &self,
        store_dir: &Path,
        package: &PackageRequest,
        tarball_url: &str,
        target: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        self.runtime
            .create_dir_all(store_dir)
            .with_context(|| format!("Failed to create store directory at {:?}", store_dir))?;

        let staging = staging_location(store_dir, &package.name, &package.version);
        if self.runtime.exists(&staging) {
            debug!("Removing leftover staging directory {:?}", staging);
            self.runtime.remove_dir_all(&staging)?;
        }
        let staging_guard = CleanupGuard::new(Arc::clone(&cleanup_ctx), staging.clone());

        let archive_path = store_dir.join(format!(
            ".download_{}@{}.tgz",
            sanitize_name(&package.name),
            package.version
        ));
        let archive_guard = CleanupGuard::new(Arc::clone(&cleanup_ctx), archive_path.clone());

        info!("downloading {}@{}", package.name, package.version);
        download_file(self.runtime, tarball_url, &archive_path, &self.http_client).await?;

        info!("installing {}@{}", package.name, package.version);
        self.extractor.extract_with_cleanup(
            self.runtime,
            &archive_path,
            &staging,
            Arc::clone(&cleanup_ctx),
        )?;

        archive_guard.success();
        if let Err(e) = self.runtime.remove_file(&archive_path) {
            warn!("Failed to remove downloaded archive {:?}: {}", archive_path, e);
        }

        // Scoped names put the cache location one directory deeper.
        if let Some(parent) = target.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        self.runtime
            .rename(&staging, target)
            .with_context(|| format!("Failed to move {:?} into the cache", staging))?;
        staging_guard.success();

        debug!("Installed {}@{} at {:?}", package.name, package.version, target);
        Ok(())
    }
}

#[async_trait]
impl<R: Runtime + 'static, E: ArchiveExtractor> Installer for RegistryInstaller<'_, R, E> {
    #[tracing::instrument(skip(self, packages))]
    async fn install(
        &self,
        root_dir: &Path,
        store_dir: &Path,
        registry_url: &str,
        packages: &[PackageRequest],
    ) -> Result<()> {
        debug!("Installing {} package(s) under {:?}", packages.len(), root_dir);
        let registry = NpmRegistry::new(self.http_client.clone(), registry_url);
        for package in packages {
            self.install_package(&registry, store_dir, package).await?;
        }
        Ok(())
    }
}
