//! Whole-archive extraction for the portable `.tar.gz` packages.
//!
//! Renode archives wrap everything in a single `renode_<version>/` folder.
//! That folder is dropped on extraction so an entry directory holds `renode`,
//! `renode-test`, `tests/` … directly. Its name is also where the real
//! version of a nightly build comes from, see [`archive_root`].

use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::error::{RenodeRunError, RenodeRunResult};

/// Name of the first path component of the first entry, without reading the
/// rest of the archive.
pub fn archive_root(archive_path: &Path) -> RenodeRunResult<Option<String>> {
    let mut archive = open(archive_path)?;
    let mut entries = archive
        .entries()
        .map_err(|e| RenodeRunError::extraction(archive_path, e))?;

    let Some(first) = entries.next() else {
        return Ok(None);
    };
    let first = first.map_err(|e| RenodeRunError::extraction(archive_path, e))?;
    let path = first
        .path()
        .map_err(|e| RenodeRunError::extraction(archive_path, e))?;

    Ok(path
        .components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().into_owned()))
}

/// Extract every entry of `archive_path` below `dest_dir`, dropping the
/// top-level folder.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> RenodeRunResult<()> {
    std::fs::create_dir_all(dest_dir)
        .map_err(|e| RenodeRunError::file_system("create extraction dir", dest_dir, e))?;

    let mut archive = open(archive_path)?;
    let entries = archive
        .entries()
        .map_err(|e| RenodeRunError::extraction(archive_path, e))?;

    let mut extracted = 0usize;
    for entry in entries {
        let mut entry = entry.map_err(|e| RenodeRunError::extraction(archive_path, e))?;
        let entry_path = entry
            .path()
            .map_err(|e| RenodeRunError::extraction(archive_path, e))?
            .into_owned();

        let Some(mut relative) = strip_root(&entry_path) else {
            return Err(RenodeRunError::extraction(
                archive_path,
                format!(
                    "refusing to extract path with parent directory or absolute reference: {}",
                    entry_path.display()
                ),
            ));
        };

        let kind = entry.header().entry_type();
        if relative.as_os_str().is_empty() {
            if kind.is_dir() {
                continue; // the top-level folder itself
            }
            relative = entry_path.clone(); // flat archive
        }
        let out = dest_dir.join(&relative);

        if kind.is_dir() {
            std::fs::create_dir_all(&out)
                .map_err(|e| RenodeRunError::file_system("create dir from archive entry", &out, e))?;
            continue;
        }

        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RenodeRunError::file_system("create parent dir from archive entry", parent, e)
            })?;
        }

        if kind == EntryType::Link {
            // Hard link targets are archive paths, so they need the same root stripping.
            let target = entry
                .link_name()
                .map_err(|e| RenodeRunError::extraction(archive_path, e))?
                .and_then(|t| strip_root(&t))
                .filter(|t| !t.as_os_str().is_empty())
                .ok_or_else(|| {
                    RenodeRunError::extraction(
                        archive_path,
                        format!("hard link {} has an invalid target", entry_path.display()),
                    )
                })?;
            std::fs::hard_link(dest_dir.join(target), &out)
                .map_err(|e| RenodeRunError::file_system("create hard link", &out, e))?;
        } else {
            entry
                .unpack(&out)
                .map_err(|e| RenodeRunError::extraction(archive_path, e))?;
        }
        extracted += 1;
    }

    if extracted == 0 {
        return Err(RenodeRunError::extraction(archive_path, "archive is empty"));
    }
    crate::trace!("Extracted {extracted} entries into {}", dest_dir.display());
    Ok(())
}

fn open(archive_path: &Path) -> RenodeRunResult<Archive<GzDecoder<std::fs::File>>> {
    let file = std::fs::File::open(archive_path)
        .map_err(|e| RenodeRunError::file_system("open archive", archive_path, e))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

/// Drop the first component. `None` for absolute paths and `..` components.
fn strip_root(path: &Path) -> Option<PathBuf> {
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    let mut components = path.components();
    components.next();
    Some(components.as_path().to_path_buf())
}
