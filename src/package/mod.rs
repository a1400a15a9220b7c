//! Versioned packages: version resolution, cache layout, manifests and the
//! per-dispatch [`PackageHandle`].

pub mod cache;
mod handle;
pub mod manifest;
pub mod version;

pub use handle::{PackageHandle, PackageSpec};
pub use version::{LATEST, VersionResolver};
