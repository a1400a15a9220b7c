//! Removal of half-written install artifacts.
//!
//! Staging directories and downloaded tarballs are registered here while an
//! install is in flight. If the install fails they are removed when their
//! [`CleanupGuard`] drops; if the process is interrupted the Ctrl-C handler
//! calls [`CleanupContext::cleanup`].

use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Tracks paths that need cleanup on interruption
#[derive(Default)]
pub struct CleanupContext {
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Clean up all registered paths
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            remove_path(&path);
        }
    }
}

fn remove_path(path: &Path) {
    debug!("Cleaning up: {:?}", path);
    if path.is_dir() {
        let _ = std::fs::remove_dir_all(path);
    } else {
        let _ = std::fs::remove_file(path);
    }
}

pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// Registers a path for cleanup and removes it on drop unless [`success`](Self::success) was called.
pub struct CleanupGuard {
    ctx: SharedCleanupContext,
    path: PathBuf,
    armed: bool,
}

impl CleanupGuard {
    pub fn new(ctx: SharedCleanupContext, path: PathBuf) -> Self {
        if let Ok(mut guard) = ctx.lock() {
            guard.add(path.clone());
        }
        Self {
            ctx,
            path,
            armed: true,
        }
    }

    /// Keep the path and stop tracking it.
    pub fn success(mut self) {
        self.armed = false;
        if let Ok(mut guard) = self.ctx.lock() {
            guard.remove(&self.path);
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        remove_path(&self.path);
        if let Ok(mut guard) = self.ctx.lock() {
            guard.remove(&self.path);
        }
    }
}
