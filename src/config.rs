//! Explicit configuration shared by every component.
//!
//! Defaults that depend on the environment (the home directory) are resolved
//! once, at the CLI boundary, through [`RenodeRunConfig::default_artifacts_root`].
//! Nothing below this module reads the environment on its own.

use std::path::{Path, PathBuf};

use bon::Builder;
use serde::Serialize;
use url::Url;

use crate::error::{RenodeRunError, RenodeRunResult};

pub const DEFAULT_BUILDS_URL: &str = "https://builds.renode.io/";
pub const DEFAULT_DASHBOARD_URL: &str = "https://new-zephyr-dashboard.renode.io/";

/// Directory (under the artifacts root) holding every downloaded distribution.
pub const DOWNLOAD_DIRNAME: &str = "renode-run.download";
/// Default location of the `renode-test` Python environment.
pub const VENV_DIRNAME: &str = "renode-run.venv";

#[derive(Serialize, Debug, Clone, Builder)]
pub struct RenodeRunConfig {
    /// Root for downloads and the test environment, `~/.config/renode` by default.
    #[builder(into)]
    pub artifacts_root: PathBuf,

    /// Host serving `renode-<version>.<package>.tar.gz` archives.
    #[builder(default = builtin_url(DEFAULT_BUILDS_URL))]
    pub builds_url: Url,

    /// Zephyr dashboard used as the demo catalog.
    #[builder(default = builtin_url(DEFAULT_DASHBOARD_URL))]
    pub dashboard_url: Url,

    /// Interpreter used to create the test environment.
    #[builder(default = PathBuf::from("python3"), into)]
    pub python: PathBuf,

    /// Device-tree to platform-description translator.
    #[builder(default = PathBuf::from("dts2repl"), into)]
    pub dts2repl: PathBuf,
}

impl RenodeRunConfig {
    /// `$HOME/.config/renode`
    pub fn default_artifacts_root() -> RenodeRunResult<PathBuf> {
        let base = directories::BaseDirs::new().ok_or_else(|| {
            RenodeRunError::file_system(
                "resolve home directory",
                "directories derives path",
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no valid home directory could be found",
                ),
            )
        })?;
        Ok(base.home_dir().join(".config").join("renode"))
    }

    pub fn download_dir(&self) -> PathBuf {
        self.artifacts_root.join(DOWNLOAD_DIRNAME)
    }

    pub fn default_venv_dir(&self) -> PathBuf {
        self.artifacts_root.join(VENV_DIRNAME)
    }
}

fn builtin_url(url: &str) -> Url {
    Url::parse(url).expect("built-in URLs are valid")
}

/// Append path segments to `base`, tolerating a missing or present trailing slash.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> RenodeRunResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| RenodeRunError::InvalidConfig {
            field: "url",
            reason: format!("`{base}` cannot be used as a base URL"),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn ensure_dir(path: &Path) -> RenodeRunResult<()> {
    std::fs::create_dir_all(path).map_err(|e| RenodeRunError::file_system("create dir", path, e))
}
