//! Version resolution
//! ==================
//!
//! Maps an optional, user supplied version onto the URL of a portable Renode
//! archive. A missing version (or the literal `latest`) selects the nightly
//! build; anything else must look like `1.15.3+20240924gitc7bc336bb`.
//!
//! The resolver never talks to the network. Whether the archive actually
//! exists is only discovered when the [`Downloader`](super::Downloader)
//! fetches it.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    config::endpoint,
    error::{RenodeRunError, RenodeRunResult},
};

/// Tag used by the build host for the most recent nightly.
pub const NIGHTLY_TAG: &str = "latest";

// <semver>+<YYYYMMDD>git<8-9 hex chars of the commit>
const VERSION_PATTERN: &str = r"[0-9]+\.[0-9]+\.[0-9]+\+[0-9]{8}git[0-9a-fA-F]{8,9}";

static VERSION_RE: OnceLock<Regex> = OnceLock::new();
static EXACT_VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| Regex::new(VERSION_PATTERN).expect("version pattern compiles"))
}

fn exact_version_re() -> &'static Regex {
    EXACT_VERSION_RE.get_or_init(|| {
        Regex::new(&format!("^{VERSION_PATTERN}$")).expect("version pattern compiles")
    })
}

/// Runtime flavour of the portable distribution.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum RenodeVariant {
    /// Mono based build, the historical default.
    #[default]
    MonoPortable,
    /// .NET based build.
    DotnetPortable,
}

impl RenodeVariant {
    pub const ALL: [RenodeVariant; 2] = [RenodeVariant::MonoPortable, RenodeVariant::DotnetPortable];

    /// Directory name used for this variant inside the cache.
    pub fn as_str(&self) -> &'static str {
        match self {
            RenodeVariant::MonoPortable => "mono-portable",
            RenodeVariant::DotnetPortable => "dotnet-portable",
        }
    }

    fn package_suffix(&self) -> &'static str {
        match self {
            RenodeVariant::MonoPortable => "linux-portable",
            RenodeVariant::DotnetPortable => "linux-portable-dotnet",
        }
    }

    /// File name of the archive published for `tag` (a version or [`NIGHTLY_TAG`]).
    pub fn package_name(&self, tag: &str) -> String {
        format!("renode-{tag}.{}.tar.gz", self.package_suffix())
    }
}

impl std::fmt::Display for RenodeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved download request. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtifactReference {
    pub variant: RenodeVariant,
    /// `None` for the nightly build; the concrete version is learned from the archive.
    pub version: Option<String>,
    pub remote_locator: Url,
}

impl ArtifactReference {
    pub fn is_nightly(&self) -> bool {
        self.version.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct VersionResolver {
    builds_url: Url,
}

impl VersionResolver {
    pub fn new(builds_url: Url) -> Self {
        Self { builds_url }
    }

    pub fn resolve(
        &self,
        variant: RenodeVariant,
        version: Option<&str>,
    ) -> RenodeRunResult<ArtifactReference> {
        let version = match version.map(str::trim) {
            None | Some(NIGHTLY_TAG) => None,
            Some(v) => {
                validate_version(v)?;
                Some(v.to_owned())
            }
        };
        let tag = version.as_deref().unwrap_or(NIGHTLY_TAG);
        let remote_locator = endpoint(&self.builds_url, &[&variant.package_name(tag)])?;

        crate::debug!("Resolved Renode {variant} `{tag}` to {remote_locator}");
        Ok(ArtifactReference {
            variant,
            version,
            remote_locator,
        })
    }
}

pub fn validate_version(version: &str) -> RenodeRunResult<()> {
    if exact_version_re().is_match(version) {
        Ok(())
    } else {
        Err(RenodeRunError::InvalidVersionFormat {
            version: version.to_owned(),
        })
    }
}

/// First version string embedded in `text`, e.g. the root folder of an archive
/// (`renode_1.15.3+20240924gitc7bc336bb`).
pub fn find_version(text: &str) -> Option<&str> {
    version_re().find(text).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> VersionResolver {
        VersionResolver::new(Url::parse("https://builds.renode.io/").unwrap())
    }

    #[test]
    fn omitted_version_resolves_to_nightly() {
        for requested in [None, Some("latest")] {
            let r = resolver()
                .resolve(RenodeVariant::MonoPortable, requested)
                .unwrap();
            assert!(r.is_nightly());
            assert_eq!(
                r.remote_locator.as_str(),
                "https://builds.renode.io/renode-latest.linux-portable.tar.gz"
            );
        }
    }

    #[test]
    fn pinned_version_is_used_verbatim() {
        let r = resolver()
            .resolve(
                RenodeVariant::DotnetPortable,
                Some("1.15.3+20240924gitc7bc336bb"),
            )
            .unwrap();
        assert_eq!(r.version.as_deref(), Some("1.15.3+20240924gitc7bc336bb"));
        assert_eq!(
            r.remote_locator.as_str(),
            "https://builds.renode.io/renode-1.15.3+20240924gitc7bc336bb.linux-portable-dotnet.tar.gz"
        );
    }

    #[test]
    fn malformed_versions_are_rejected() {
        for bad in [
            "1.15.3",
            "1.15+20240924gitc7bc336bb",
            "1.15.3+2024092gitc7bc336bb",
            "1.15.3+20240924gitc7bc",
            "1.15.3+20240924gitzzzzzzzz",
            "v1.15.3+20240924gitc7bc336bb",
            "",
        ] {
            let err = resolver()
                .resolve(RenodeVariant::MonoPortable, Some(bad))
                .unwrap_err();
            assert!(
                matches!(err, RenodeRunError::InvalidVersionFormat { .. }),
                "`{bad}` should be rejected, got {err}"
            );
        }
    }

    #[test]
    fn version_is_found_inside_archive_root_names() {
        assert_eq!(
            find_version("renode_1.15.3+20240924gitc7bc336bb/renode"),
            Some("1.15.3+20240924gitc7bc336bb")
        );
        assert_eq!(find_version("renode_latest"), None);
    }

    #[test]
    fn variant_names_match_cache_directories() {
        assert_eq!(RenodeVariant::MonoPortable.to_string(), "mono-portable");
        assert_eq!(RenodeVariant::DotnetPortable.to_string(), "dotnet-portable");
        assert_eq!(RenodeVariant::default(), RenodeVariant::MonoPortable);
    }
}
