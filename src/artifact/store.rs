use std::time::{Duration, Instant};

use serde::Serialize;
use url::Url;

use crate::{
    artifact::{
        cache::{ArtifactCache, CacheEntry, CacheLayout},
        download::{archive_version, ensure_supported_platform, Downloader},
        version::{RenodeVariant, VersionResolver},
    },
    config::RenodeRunConfig,
    error::RenodeRunResult,
};

/// Resolve, cache and download Renode distributions below one download directory.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    cache: ArtifactCache,
    resolver: VersionResolver,
    downloader: Downloader,
}

impl ArtifactStore {
    pub fn new(config: &RenodeRunConfig, layout: CacheLayout) -> Self {
        Self::with_download_dir(config.download_dir(), config.builds_url.clone(), layout)
    }

    /// Store rooted at an explicit download directory (`download --path`).
    pub fn with_download_dir(
        download_dir: impl Into<std::path::PathBuf>,
        builds_url: Url,
        layout: CacheLayout,
    ) -> Self {
        Self {
            cache: ArtifactCache::new(download_dir, layout),
            resolver: VersionResolver::new(builds_url),
            downloader: Downloader::new(),
        }
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Make `(variant, version)` available in the cache.
    ///
    /// * pinned version, versioned layout: a complete entry is reused without
    ///   touching the network unless `force` is set.
    /// * nightly, versioned layout: the archive is always fetched since only it
    ///   knows its version; installation is skipped if that version is cached.
    /// * flat layout: always downloads and replaces the variant directory.
    pub fn download(
        &self,
        variant: RenodeVariant,
        version: Option<&str>,
        force: bool,
    ) -> RenodeRunResult<DownloadOutcome> {
        let started = Instant::now();
        let reference = self.resolver.resolve(variant, version)?;

        let (status, entry) = match (self.cache.layout(), reference.version.as_deref()) {
            (CacheLayout::Versioned, Some(version)) => {
                let entry = self.cache.make_entry(variant, Some(version))?;
                if entry.is_complete() && !force {
                    crate::info!("Renode {version} ({variant}) is already cached");
                    (DownloadStatus::AlreadyCached, entry)
                } else {
                    let entry = self.downloader.fetch(&reference, &entry)?;
                    (DownloadStatus::Downloaded, entry)
                }
            }
            (CacheLayout::Versioned, None) => {
                ensure_supported_platform()?;
                let archive = self
                    .downloader
                    .download_archive(&reference.remote_locator, &self.cache.variant_dir(variant))?;
                let version = archive_version(archive.path())?;
                crate::debug!("Nightly build is Renode {version}");

                let entry = self.cache.make_entry(variant, Some(&version))?;
                if entry.is_complete() && !force {
                    crate::info!("Latest Renode {version} ({variant}) is already cached");
                    (DownloadStatus::AlreadyCached, entry)
                } else {
                    self.downloader.install_archive(archive.path(), &entry)?;
                    (DownloadStatus::Downloaded, entry)
                }
            }
            (CacheLayout::Flat, _) => {
                let entry = self.cache.make_entry(variant, None)?;
                let entry = self.downloader.fetch(&reference, &entry)?;
                (DownloadStatus::Downloaded, entry)
            }
        };

        Ok(DownloadOutcome {
            duration: started.elapsed(),
            status,
            entry,
        })
    }

    /// Newest complete entry of `variant`, downloading the nightly build when
    /// nothing is cached.
    ///
    /// Versioned entries win over a flat one in the same download directory.
    pub fn locate_or_download(&self, variant: RenodeVariant) -> RenodeRunResult<CacheEntry> {
        let dir = self.cache.download_dir();
        for layout in [CacheLayout::Versioned, CacheLayout::Flat] {
            match ArtifactCache::new(dir, layout).locate(variant, None) {
                Ok(entry) => return Ok(entry),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        crate::info!("No Renode ({variant}) found in {}, downloading the latest build", dir.display());
        let store = Self {
            cache: ArtifactCache::new(dir, CacheLayout::Versioned),
            ..self.clone()
        };
        Ok(store.download(variant, None, false)?.entry)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DownloadStatus {
    /// The archive was fetched and installed.
    Downloaded,
    /// A complete entry already existed; nothing was installed.
    AlreadyCached,
}

/// Summary of [`ArtifactStore::download`]. Implements [`Display`](std::fmt::Display).
#[derive(Clone, Debug, Serialize)]
pub struct DownloadOutcome {
    pub duration: Duration,
    pub status: DownloadStatus,
    pub entry: CacheEntry,
}

impl std::fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use std::fmt::Write;
        writeln!(f, "DownloadOutcome:")?;
        let mut indented = indenter::indented(f).with_str("   ");
        writeln!(indented, "Status: {:?}", self.status)?;
        writeln!(indented, "Variant: {}", self.entry.variant())?;
        writeln!(
            indented,
            "Version: {}",
            self.entry.version().unwrap_or("unknown")
        )?;
        writeln!(indented, "Layout: {:?}", self.entry.layout())?;
        writeln!(indented, "Path: {}", self.entry.root_path().display())?;
        writeln!(indented, "Duration: {:?}", self.duration)?;
        Ok(())
    }
}
