//! Blocking archive download and installation.
//!
//! An install always goes through the same three steps:
//!
//! 1. stream the archive into a temporary file next to the destination,
//! 2. clear the destination and extract into it,
//! 3. write the completion marker.
//!
//! The temporary archive is deleted when it goes out of scope, success or
//! not. An archive orphaned by a killed process is deleted by the next
//! download into the same directory. Any failure after step 1 removes the destination again so the next
//! attempt starts from an empty directory. There is no retry here; a failed
//! download is reported and the user re-runs the command.

use std::{
    io::{Read, Write},
    path::Path,
    time::{Duration, Instant},
};

use tempfile::NamedTempFile;
use url::Url;

use crate::{
    artifact::{
        archive::{archive_root, extract_tar_gz},
        cache::CacheEntry,
        version::{find_version, ArtifactReference},
    },
    config::ensure_dir,
    error::{RenodeRunError, RenodeRunResult},
};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
const STAGING_PREFIX: &str = ".renode-run-";
const STAGING_SUFFIX: &str = ".tar.gz";

#[derive(Clone, Debug)]
pub struct Downloader {
    progress_interval: Duration,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Download `reference` and install it as `entry`.
    ///
    /// A nightly reference learns its concrete version from the archive; the
    /// returned entry carries it.
    pub fn fetch(
        &self,
        reference: &ArtifactReference,
        entry: &CacheEntry,
    ) -> RenodeRunResult<CacheEntry> {
        ensure_supported_platform()?;

        let staging = entry
            .root_path()
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let archive = self.download_archive(&reference.remote_locator, staging)?;

        let version = match &reference.version {
            Some(v) => v.clone(),
            None => archive_version(archive.path())?,
        };
        let entry = entry.clone().with_version(Some(version));
        self.install_archive(archive.path(), &entry)?;
        Ok(entry)
    }

    /// Stream `url` into a temporary `.tar.gz` inside `dir`.
    pub fn download_archive(&self, url: &Url, dir: &Path) -> RenodeRunResult<NamedTempFile> {
        ensure_dir(dir)?;
        remove_stale_archives(dir);
        let mut file = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| RenodeRunError::file_system("create temporary archive", dir, e))?;

        crate::info!("Downloading {url}");
        let resp = ureq::get(url.as_str()).call().map_err(|e| match e {
            ureq::Error::StatusCode(code) => RenodeRunError::network(url, format!("HTTP {code}")),
            other => RenodeRunError::network(url, other),
        })?;

        let body = resp.into_body();
        let total = body.content_length();
        let mut reader = ProgressReader::new(body.into_reader(), total, self.progress_interval);

        std::io::copy(&mut reader, file.as_file_mut()).map_err(|e| {
            // Body read errors surface as io errors from the reader.
            RenodeRunError::network(url, e)
        })?;
        file.as_file_mut()
            .flush()
            .map_err(|e| RenodeRunError::file_system("flush temporary archive", file.path(), e))?;

        crate::info!("Downloaded {}", human_size(reader.read));
        Ok(file)
    }

    /// Replace `entry` with the contents of `archive`.
    pub fn install_archive(&self, archive: &Path, entry: &CacheEntry) -> RenodeRunResult<()> {
        entry.remove()?;
        let installed = extract_tar_gz(archive, entry.root_path()).and_then(|()| entry.mark_complete());
        if let Err(e) = installed {
            if let Err(cleanup) = entry.remove() {
                crate::warn!("Failed to clean up {}: {cleanup}", entry.root_path().display());
            }
            return Err(e);
        }
        crate::info!("Installed {entry}");
        Ok(())
    }
}

/// Delete staging archives left in `dir` by an interrupted download.
fn remove_stale_archives(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX)) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => crate::debug!("Removed stale archive {}", entry.path().display()),
            Err(e) => crate::warn!("Failed to remove stale archive {}: {e}", entry.path().display()),
        }
    }
}

/// Version embedded in the archive's top-level folder name.
pub fn archive_version(archive: &Path) -> RenodeRunResult<String> {
    let root = archive_root(archive)?
        .ok_or_else(|| RenodeRunError::extraction(archive, "archive is empty"))?;
    find_version(&root).map(str::to_owned).ok_or_else(|| {
        RenodeRunError::extraction(
            archive,
            format!("could not find a Renode version in the archive root `{root}`"),
        )
    })
}

/// Prebuilt portable packages only exist for Linux.
pub fn ensure_supported_platform() -> RenodeRunResult<()> {
    if cfg!(target_os = "linux") {
        Ok(())
    } else {
        Err(RenodeRunError::Unsupported {
            what: "automatic Renode download",
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            reason: "portable packages are only published for Linux; install Renode manually \
                     and point --artifacts-path at it"
                .into(),
        })
    }
}

struct ProgressReader<R> {
    inner: R,
    total: Option<u64>,
    read: u64,
    interval: Duration,
    last_report: Instant,
}

impl<R: Read> ProgressReader<R> {
    fn new(inner: R, total: Option<u64>, interval: Duration) -> Self {
        Self {
            inner,
            total,
            read: 0,
            interval,
            last_report: Instant::now(),
        }
    }

    fn report(&mut self) {
        if self.last_report.elapsed() < self.interval {
            return;
        }
        self.last_report = Instant::now();
        match self.total {
            Some(total) if total > 0 => crate::info!(
                "Downloaded {} of {} ({}%)",
                human_size(self.read),
                human_size(total),
                self.read * 100 / total
            ),
            _ => crate::info!("Downloaded {}", human_size(self.read)),
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        self.report();
        Ok(n)
    }
}

fn human_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / MIB)
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{
        archive::tests::tar_gz,
        cache::{ArtifactCache, CacheLayout},
        version::{RenodeVariant, VersionResolver},
    };

    const VERSION: &str = "1.15.3+20240924gitc7bc336bb";

    fn package() -> Vec<u8> {
        tar_gz(&[
            (&format!("renode_{VERSION}/renode"), b"#!/bin/sh\nexit 0\n", 0o755),
            (&format!("renode_{VERSION}/tests/requirements.txt"), b"robotframework\n", 0o644),
        ])
    }

    fn resolver(server: &mockito::Server) -> VersionResolver {
        VersionResolver::new(Url::parse(&server.url()).unwrap())
    }

    #[test]
    fn pinned_fetch_installs_a_complete_entry() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", format!("/renode-{VERSION}.linux-portable.tar.gz").as_str())
            .with_status(200)
            .with_body(package())
            .create();

        let tmp = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path(), CacheLayout::Versioned);
        let reference = resolver(&server)
            .resolve(RenodeVariant::MonoPortable, Some(VERSION))
            .unwrap();
        let entry = cache.make_entry(RenodeVariant::MonoPortable, Some(VERSION)).unwrap();

        let entry = Downloader::new().fetch(&reference, &entry).unwrap();

        mock.assert();
        assert!(entry.is_complete());
        assert!(entry.executable().is_file());
        assert!(entry.test_requirements().is_file());
        // Only the entry is left; the temporary archive is gone.
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path().join("mono-portable"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from(format!("renode-{VERSION}"))]);
    }

    #[test]
    fn archives_orphaned_by_an_interrupted_download_are_removed() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", format!("/renode-{VERSION}.linux-portable.tar.gz").as_str())
            .with_status(200)
            .with_body(package())
            .create();

        let tmp = tempfile::tempdir().unwrap();
        let variant_dir = tmp.path().join("mono-portable");
        std::fs::create_dir_all(&variant_dir).unwrap();
        std::fs::write(variant_dir.join(".renode-run-aOiTG3.tar.gz"), b"half an archive").unwrap();
        std::fs::write(variant_dir.join("notes.tar.gz"), b"not ours").unwrap();

        let cache = ArtifactCache::new(tmp.path(), CacheLayout::Versioned);
        let reference = resolver(&server)
            .resolve(RenodeVariant::MonoPortable, Some(VERSION))
            .unwrap();
        let entry = cache.make_entry(RenodeVariant::MonoPortable, Some(VERSION)).unwrap();
        Downloader::new().fetch(&reference, &entry).unwrap();

        let mut names: Vec<_> = std::fs::read_dir(&variant_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["notes.tar.gz".to_owned(), format!("renode-{VERSION}")]);
    }

    #[test]
    fn nightly_fetch_learns_the_version_from_the_archive() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/renode-latest.linux-portable-dotnet.tar.gz")
            .with_status(200)
            .with_body(package())
            .create();

        let tmp = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path(), CacheLayout::Flat);
        let reference = resolver(&server)
            .resolve(RenodeVariant::DotnetPortable, None)
            .unwrap();
        let entry = cache.make_entry(RenodeVariant::DotnetPortable, None).unwrap();

        let entry = Downloader::new().fetch(&reference, &entry).unwrap();
        assert_eq!(entry.version(), Some(VERSION));
        assert_eq!(
            cache
                .locate(RenodeVariant::DotnetPortable, None)
                .unwrap()
                .version(),
            Some(VERSION)
        );
    }

    #[test]
    fn http_errors_leave_nothing_behind() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", format!("/renode-{VERSION}.linux-portable.tar.gz").as_str())
            .with_status(404)
            .create();

        let tmp = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path(), CacheLayout::Versioned);
        let reference = resolver(&server)
            .resolve(RenodeVariant::MonoPortable, Some(VERSION))
            .unwrap();
        let entry = cache.make_entry(RenodeVariant::MonoPortable, Some(VERSION)).unwrap();

        let err = Downloader::new().fetch(&reference, &entry).unwrap_err();
        match err {
            RenodeRunError::Network { reason, .. } => assert!(reason.contains("404"), "{reason}"),
            other => panic!("expected a network error, got {other}"),
        }
        assert!(!entry.root_path().exists());
        assert_eq!(
            std::fs::read_dir(tmp.path().join("mono-portable")).unwrap().count(),
            0
        );
    }

    #[test]
    fn corrupt_archives_remove_the_destination() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", format!("/renode-{VERSION}.linux-portable.tar.gz").as_str())
            .with_status(200)
            .with_body("definitely not a tarball")
            .create();

        let tmp = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path(), CacheLayout::Versioned);
        let reference = resolver(&server)
            .resolve(RenodeVariant::MonoPortable, Some(VERSION))
            .unwrap();
        let entry = cache.make_entry(RenodeVariant::MonoPortable, Some(VERSION)).unwrap();

        let err = Downloader::new().fetch(&reference, &entry).unwrap_err();
        assert!(matches!(err, RenodeRunError::Extraction { .. }), "got {err}");
        assert!(!entry.root_path().exists());
    }

    #[test]
    fn nightly_without_a_version_in_the_root_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("nightly.tar.gz");
        std::fs::write(&archive, tar_gz(&[("renode_latest/renode", b"", 0o755)])).unwrap();

        let err = archive_version(&archive).unwrap_err();
        assert!(matches!(err, RenodeRunError::Extraction { .. }), "got {err}");
    }

    #[test]
    fn progress_reader_counts_bytes() {
        let data = vec![7u8; 4096];
        let mut reader = ProgressReader::new(&data[..], Some(4096), Duration::ZERO);
        let mut sink = Vec::new();
        std::io::copy(&mut reader, &mut sink).unwrap();
        assert_eq!(reader.read, 4096);
        assert_eq!(sink, data);
    }
}
