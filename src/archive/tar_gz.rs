use crate::cleanup::SharedCleanupContext;
use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

use super::ArchiveExtractor;

/// Extractor for gzip-compressed tarballs, the format registries publish packages in.
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tgz") || name.ends_with(".tar.gz")
    }

    fn extract_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        self.extract_impl(runtime, archive_path, extract_to, cleanup_ctx)
    }
}

/// Entry path with `.` dropped, or `None` if it is absolute or climbs out with `..`.
fn enclosed_name(path: &Path) -> Option<PathBuf> {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => result.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if result.as_os_str().is_empty() {
        None
    } else {
        Some(result)
    }
}

impl TarGzExtractor {
    fn extract_impl<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        debug!("Extracting tarball to {:?}...", extract_to);

        // Registry tarballs wrap everything in one top-level directory (`package/`).
        // Unpack next to the destination first, then lift that directory's contents.
        let dir_name = extract_to
            .file_name()
            .ok_or_else(|| anyhow!("Invalid extraction target {:?}", extract_to))?;
        let temp_extract_dir =
            extract_to.with_file_name(format!("{}_temp_extract", dir_name.to_string_lossy()));
        if runtime.exists(&temp_extract_dir) {
            runtime.remove_dir_all(&temp_extract_dir)?;
        }
        runtime.create_dir_all(&temp_extract_dir)?;

        if let Ok(mut ctx) = cleanup_ctx.lock() {
            ctx.add(temp_extract_dir.clone());
        }

        let result = self
            .unpack_entries(runtime, archive_path, &temp_extract_dir)
            .and_then(|()| lift_contents(runtime, &temp_extract_dir, extract_to));

        if let Err(e) = runtime.remove_dir_all(&temp_extract_dir) {
            debug!("Failed to remove {:?}: {}", temp_extract_dir, e);
        }
        if let Ok(mut ctx) = cleanup_ctx.lock() {
            ctx.remove(&temp_extract_dir);
        }

        result?;
        info!("Extraction complete.");
        Ok(())
    }

    fn unpack_entries<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        unpack_dir: &Path,
    ) -> Result<()> {
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        let mut archive = Archive::new(GzDecoder::new(file));

        debug!("Unpacking to temp dir: {:?}", unpack_dir);
        let entries = archive
            .entries()
            .with_context(|| format!("Failed to read tarball {:?}", archive_path))?;
        for entry in entries {
            let mut entry = entry.context("Failed to read tarball entry")?;
            let raw_path = entry.path().context("Invalid entry path")?.into_owned();

            let Some(entry_path) = enclosed_name(&raw_path) else {
                debug!("Skipping entry with unsafe path {:?}", raw_path);
                continue;
            };
            let full_path = unpack_dir.join(&entry_path);

            match entry.header().entry_type() {
                EntryType::Directory => runtime.create_dir_all(&full_path)?,
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest_file = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest_file)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    drop(dest_file);

                    #[cfg(unix)]
                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode & 0o777)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                }
                other => debug!("Skipping {:?} entry {:?}", other, entry_path),
            }
        }
        Ok(())
    }
}

/// Move the unpacked files into `extract_to`, dropping a lone wrapper directory.
fn lift_contents<R: Runtime>(runtime: &R, unpack_dir: &Path, extract_to: &Path) -> Result<()> {
    let entries = runtime
        .read_dir(unpack_dir)
        .context("Failed to read temp extraction directory")?;

    let Some(first) = entries.first() else {
        return Err(anyhow!("Archive appears to be empty."));
    };
    let source_dir = if entries.len() == 1 && runtime.is_dir(first) {
        first.clone()
    } else {
        unpack_dir.to_path_buf()
    };

    runtime.create_dir_all(extract_to)?;
    debug!("Moving contents from {:?} to {:?}", source_dir, extract_to);
    for item in runtime.read_dir(&source_dir)? {
        let Some(name) = item.file_name() else {
            continue;
        };
        runtime.rename(&item, &extract_to.join(name))?;
    }
    Ok(())
}
