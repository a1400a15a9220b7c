//! Advisory check for a newer compatible release of pluck itself.

use log::{debug, warn};
use semver::Version;

use crate::package::VersionResolver;

/// Registry name pluck itself is published under.
pub const SELF_PACKAGE: &str = "@pluck-cli/cli";

/// Newest published release compatible with `current`, if newer than it.
/// Any failure counts as "no update".
pub async fn newer_version(resolver: &VersionResolver<'_>, current: &Version) -> Option<Version> {
    match resolver.matching_at_least(current, SELF_PACKAGE).await {
        Ok(Some(found)) if found > *current => Some(found),
        Ok(_) => None,
        Err(e) => {
            debug!("Update check failed: {:#}", e);
            None
        }
    }
}

pub async fn check_for_update(resolver: &VersionResolver<'_>, current: &Version) {
    if let Some(found) = newer_version(resolver, current).await {
        warn!(
            "pluck {} is available (current: {}). Install it with: npm install -g {}",
            found, current, SELF_PACKAGE
        );
    }
}
