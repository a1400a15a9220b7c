//! Version resolution against a package registry.
//!
//! Registry documents list versions as free-form strings. Everything here
//! works on parsed [`semver::Version`]s sorted newest first; strings that do
//! not parse are dropped instead of failing the lookup.

use anyhow::Result;
use log::debug;
use semver::{Comparator, Op, Version, VersionReq};

use crate::registry::Registry;

/// Version constraint meaning "whatever the registry's newest version is".
pub const LATEST: &str = "latest";

/// Parse version strings, dropping malformed ones, sorted descending.
pub fn parse_versions<I, S>(versions: I) -> Vec<Version>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed: Vec<Version> = versions
        .into_iter()
        .filter_map(|v| match Version::parse(v.as_ref()) {
            Ok(version) => Some(version),
            Err(e) => {
                debug!("Ignoring malformed version {:?}: {}", v.as_ref(), e);
                None
            }
        })
        .collect();
    sort_descending(&mut parsed);
    parsed
}

/// Sort newest first by semver precedence.
pub fn sort_descending(versions: &mut [Version]) {
    versions.sort_by(|a, b| b.cmp(a));
}

/// The newest version, or `None` for an empty set.
pub fn latest_of(versions: &[Version]) -> Option<&Version> {
    versions.iter().max()
}

/// Caret requirement anchored at `base`, keeping `base`'s pre-release tag.
///
/// Built directly rather than parsed from `^{base}` because our own version may
/// carry build metadata, which requirement syntax does not accept.
pub fn caret_requirement(base: &Version) -> VersionReq {
    VersionReq {
        comparators: vec![Comparator {
            op: Op::Caret,
            major: base.major,
            minor: Some(base.minor),
            patch: Some(base.patch),
            pre: base.pre.clone(),
        }],
    }
}

/// The newest version compatible with `^base`, or `None`.
pub fn matching_of(base: &Version, versions: &[Version]) -> Option<Version> {
    let req = caret_requirement(base);
    let mut matching: Vec<Version> = versions
        .iter()
        .filter(|v| req.matches(v))
        .cloned()
        .collect();
    sort_descending(&mut matching);
    matching.into_iter().next()
}

/// Resolves versions for package names through a [`Registry`].
pub struct VersionResolver<'a> {
    registry: &'a dyn Registry,
}

impl<'a> VersionResolver<'a> {
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self { registry }
    }

    pub fn registry_url(&self) -> &str {
        self.registry.url()
    }

    /// All published versions of `name`, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_versions(&self, name: &str) -> Result<Vec<Version>> {
        let doc = self.registry.package(name).await?;
        Ok(parse_versions(doc.versions.keys()))
    }

    /// The newest published version of `name`.
    pub async fn latest(&self, name: &str) -> Result<Option<Version>> {
        let versions = self.list_versions(name).await?;
        Ok(latest_of(&versions).cloned())
    }

    /// The newest published version of `name` compatible with `^base`.
    pub async fn matching_at_least(&self, base: &Version, name: &str) -> Result<Option<Version>> {
        let versions = self.list_versions(name).await?;
        Ok(matching_of(base, &versions))
    }
}
