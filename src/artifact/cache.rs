//! On-disk artifact cache
//! ======================
//!
//! ```text
//! <download_dir>/                          # e.g. ~/.config/renode/renode-run.download
//! ├── mono-portable/                       # CacheLayout::Versioned
//! │   ├── renode-1.15.3+20240924gitc7bc336bb/
//! │   │   ├── .renode-run.complete
//! │   │   ├── renode
//! │   │   └── renode-test
//! │   └── renode-1.15.3+20241005git8ce1d3ba3/
//! ├── dotnet-portable/                     # CacheLayout::Flat
//! │   ├── .renode-run.complete
//! │   └── renode
//! └── dotnet-portable-test/                # flat companion (renode-test results)
//! ```
//!
//! An entry only counts once its completion marker exists. The marker is the
//! last thing written by an install, so an interrupted download or extraction
//! leaves a directory that is treated as a miss and cleared by the next
//! install.
//!
//! # Picking the latest version
//!
//! Without an explicit version, [`ArtifactCache::locate`] picks the
//! lexicographically greatest version string. Versions embed a `YYYYMMDD`
//! build date, so this approximates chronological order; it is **not**
//! semantic versioning and breaks if the version format ever changes
//! (`1.9.0+…` sorts after `1.10.0+…`).

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    artifact::version::RenodeVariant,
    config::ensure_dir,
    error::{RenodeRunError, RenodeRunResult},
};

/// Written last by a successful install; holds the version string.
pub const COMPLETION_MARKER: &str = ".renode-run.complete";

const VERSION_DIR_PREFIX: &str = "renode-";
const FLAT_TEST_SUFFIX: &str = "-test";

#[cfg(not(windows))]
pub const RENODE_EXECUTABLE: &str = "renode";
#[cfg(windows)]
pub const RENODE_EXECUTABLE: &str = "renode.exe";

#[cfg(not(windows))]
pub const RENODE_TEST_EXECUTABLE: &str = "renode-test";
#[cfg(windows)]
pub const RENODE_TEST_EXECUTABLE: &str = "renode-test.bat";

/// How distributions are laid out below the variant directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum CacheLayout {
    /// One directory per variant, replaced on every download.
    Flat,
    /// One `renode-<version>` directory per version.
    #[default]
    Versioned,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    root_path: PathBuf,
    variant: RenodeVariant,
    version: Option<String>,
    layout: CacheLayout,
}

impl CacheEntry {
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn variant(&self) -> RenodeVariant {
        self.variant
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn layout(&self) -> CacheLayout {
        self.layout
    }

    pub fn is_complete(&self) -> bool {
        self.root_path.join(COMPLETION_MARKER).is_file()
    }

    pub fn executable(&self) -> PathBuf {
        self.root_path.join(RENODE_EXECUTABLE)
    }

    pub fn test_executable(&self) -> PathBuf {
        self.root_path.join(RENODE_TEST_EXECUTABLE)
    }

    /// `tests/requirements.txt` shipped with the distribution.
    pub fn test_requirements(&self) -> PathBuf {
        self.root_path.join("tests").join("requirements.txt")
    }

    /// Sibling `<variant>-test` directory; only the flat layout has one.
    pub fn companion_test_dir(&self) -> Option<PathBuf> {
        match self.layout {
            CacheLayout::Flat => {
                let mut name = self.root_path.file_name()?.to_os_string();
                name.push(FLAT_TEST_SUFFIX);
                Some(self.root_path.with_file_name(name))
            }
            CacheLayout::Versioned => None,
        }
    }

    pub(crate) fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// Record the install as complete.
    pub(crate) fn mark_complete(&self) -> RenodeRunResult<()> {
        let marker = self.root_path.join(COMPLETION_MARKER);
        std::fs::write(&marker, self.version.as_deref().unwrap_or_default())
            .map_err(|e| RenodeRunError::file_system("write completion marker", marker, e))
    }

    fn recorded_version(&self) -> Option<String> {
        std::fs::read_to_string(self.root_path.join(COMPLETION_MARKER))
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
    }

    /// Remove the entry (and its companion) from disk. Missing paths are fine.
    pub fn remove(&self) -> RenodeRunResult<()> {
        let mut paths = vec![self.root_path.clone()];
        paths.extend(self.companion_test_dir());
        for path in paths {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(RenodeRunError::file_system("remove cache entry", path, e)),
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Renode {} ({}) in {}",
            self.version.as_deref().unwrap_or("unknown version"),
            self.variant,
            self.root_path.display()
        )
    }
}

#[derive(Clone, Debug)]
pub struct ArtifactCache {
    download_dir: PathBuf,
    layout: CacheLayout,
}

impl ArtifactCache {
    pub fn new(download_dir: impl Into<PathBuf>, layout: CacheLayout) -> Self {
        Self {
            download_dir: download_dir.into(),
            layout,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn layout(&self) -> CacheLayout {
        self.layout
    }

    pub fn variant_dir(&self, variant: RenodeVariant) -> PathBuf {
        self.download_dir.join(variant.as_str())
    }

    /// Directory an entry for `(variant, version)` lives in under this layout.
    /// Versioned entries need a version.
    pub fn entry_path(&self, variant: RenodeVariant, version: Option<&str>) -> RenodeRunResult<PathBuf> {
        match (self.layout, version) {
            (CacheLayout::Flat, _) => Ok(self.variant_dir(variant)),
            (CacheLayout::Versioned, Some(v)) => Ok(self
                .variant_dir(variant)
                .join(format!("{VERSION_DIR_PREFIX}{v}"))),
            (CacheLayout::Versioned, None) => Err(RenodeRunError::InvalidConfig {
                field: "version",
                reason: "versioned cache entries need a concrete version".into(),
            }),
        }
    }

    /// Find a complete entry. A missing version means "whatever is newest".
    pub fn locate(&self, variant: RenodeVariant, version: Option<&str>) -> RenodeRunResult<CacheEntry> {
        let found = match self.layout {
            CacheLayout::Flat => {
                let entry = self.entry(variant, None)?;
                let recorded = entry.recorded_version();
                let entry = entry.with_version(recorded);
                let matches = match version {
                    Some(v) => entry.version() == Some(v),
                    None => true,
                };
                (entry.is_complete() && matches).then_some(entry)
            }
            CacheLayout::Versioned => {
                let version = match version {
                    Some(v) => Some(v.to_owned()),
                    None => self.cached_versions(variant)?.pop(),
                };
                match version {
                    Some(v) => {
                        let entry = self.entry(variant, Some(&v))?;
                        entry.is_complete().then_some(entry)
                    }
                    None => None,
                }
            }
        };

        match found {
            Some(entry) => {
                crate::debug!("Found {entry}");
                Ok(entry)
            }
            None => Err(RenodeRunError::NotFound {
                variant,
                path: self.variant_dir(variant),
            }),
        }
    }

    /// Build the entry for `(variant, version)` and create its parent directory.
    /// The entry directory itself is left to the installer.
    pub fn make_entry(&self, variant: RenodeVariant, version: Option<&str>) -> RenodeRunResult<CacheEntry> {
        let entry = self.entry(variant, version)?;
        if let Some(parent) = entry.root_path.parent() {
            ensure_dir(parent)?;
        }
        Ok(entry)
    }

    /// Complete versioned entries of `variant`, sorted ascending.
    pub fn cached_versions(&self, variant: RenodeVariant) -> RenodeRunResult<Vec<String>> {
        let dir = self.variant_dir(variant);
        let read = match std::fs::read_dir(&dir) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RenodeRunError::file_system("read variant dir", dir, e)),
        };

        let mut versions = Vec::new();
        for item in read {
            let path = item
                .map_err(|e| RenodeRunError::file_system("read dir entry", &dir, e))?
                .path();
            if !path.join(COMPLETION_MARKER).is_file() {
                continue;
            }
            if let Some(version) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(VERSION_DIR_PREFIX))
            {
                versions.push(version.to_owned());
            }
        }
        versions.sort();
        Ok(versions)
    }

    fn entry(&self, variant: RenodeVariant, version: Option<&str>) -> RenodeRunResult<CacheEntry> {
        Ok(CacheEntry {
            root_path: self.entry_path(variant, version)?,
            variant,
            version: version.map(str::to_owned),
            layout: self.layout,
        })
    }
}
