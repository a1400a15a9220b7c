pub mod archive;
pub mod cleanup;
pub mod config;
pub mod dispatch;
pub mod download;
pub mod error;
pub mod http;
pub mod install;
pub mod lifecycle;
pub mod loader;
pub mod package;
pub mod registry;
pub mod runtime;
pub mod update_check;

/// Version of this build, derived from git tags at build time.
pub const VERSION: &str = env!("PLUCK_VERSION");
