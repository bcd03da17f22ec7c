//! Quick-start demos
//! =================
//!
//! A demo is a Zephyr binary plus a platform description for the board it was
//! built for. The binary comes from the dashboard (a sample name), from a
//! local `.elf`, or from an arbitrary URL. The platform description is either
//! the dashboard's prebuilt `.repl` or translated locally from the board's
//! device tree.
//!
//! With `save` set, the device tree and the generated description are left
//! in the working directory as `<board>.dts` and `<board>.repl` so they can be
//! edited and reused. Everything else goes to a scratch directory owned by
//! the [`DemoResolver`].

pub mod catalog;
pub mod script;
pub mod translate;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use url::Url;

use crate::{
    demo::{
        catalog::DemoCatalog,
        script::render_script,
        translate::PlatformTranslator,
    },
    error::{RenodeRunError, RenodeRunResult},
};

/// Sample run when `demo` gets no target.
pub const DEFAULT_SAMPLE: &str = "shell_module";
/// Sample whose device tree describes a board for user supplied binaries.
pub const PLATFORM_SAMPLE: &str = "hello_world";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum DemoTarget {
    /// Prebuilt sample from the catalog, e.g. `shell_module`.
    Sample(String),
    LocalBinary(PathBuf),
    RemoteBinary(Url),
}

impl DemoTarget {
    pub fn parse(target: &str) -> RenodeRunResult<Self> {
        let path = Path::new(target);
        if path.is_file() {
            return Ok(Self::LocalBinary(path.to_path_buf()));
        }
        if target.starts_with("http://") || target.starts_with("https://") {
            let url = Url::parse(target).map_err(|e| RenodeRunError::InvalidConfig {
                field: "demo binary URL",
                reason: e.to_string(),
            })?;
            return Ok(Self::RemoteBinary(url));
        }
        if target.ends_with(".elf") || target.contains(std::path::MAIN_SEPARATOR) {
            return Err(RenodeRunError::file_system(
                "open demo binary",
                path,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        Ok(Self::Sample(target.to_owned()))
    }
}

impl Default for DemoTarget {
    fn default() -> Self {
        Self::Sample(DEFAULT_SAMPLE.to_owned())
    }
}

/// A file Renode loads with `@`, either on disk or remote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum DemoResource {
    Local(PathBuf),
    Remote(Url),
}

impl std::fmt::Display for DemoResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemoResource::Local(path) => write!(f, "{}", path.display()),
            DemoResource::Remote(url) => write!(f, "{url}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DemoSpec {
    pub board: String,
    /// `None` for user supplied binaries.
    pub sample: Option<String>,
    pub binary: DemoResource,
    pub platform_description: DemoResource,
    /// Device tree the platform description was generated from.
    pub hardware_description: Option<PathBuf>,
}

pub struct DemoResolver<C, T> {
    catalog: C,
    translator: T,
    work_dir: PathBuf,
    scratch: TempDir,
}

impl<C: DemoCatalog, T: PlatformTranslator> DemoResolver<C, T> {
    /// `work_dir` receives saved descriptions, usually the current directory.
    pub fn new(catalog: C, translator: T, work_dir: impl Into<PathBuf>) -> RenodeRunResult<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("renode-run-demo-")
            .tempdir()
            .map_err(|e| {
                RenodeRunError::file_system("create scratch dir", std::env::temp_dir(), e)
            })?;
        Ok(Self {
            catalog,
            translator,
            work_dir: work_dir.into(),
            scratch,
        })
    }

    pub fn resolve_demo(
        &self,
        board: &str,
        target: &DemoTarget,
        save: bool,
    ) -> RenodeRunResult<DemoSpec> {
        match target {
            DemoTarget::Sample(sample) => {
                let artifacts = self.catalog.sample(board, sample)?;
                let (platform_description, hardware_description) = if save {
                    let (dts, repl) = self.generate_platform(board, &artifacts.device_tree, &self.work_dir)?;
                    (DemoResource::Local(repl), Some(dts))
                } else {
                    (DemoResource::Remote(artifacts.platform), None)
                };
                Ok(DemoSpec {
                    board: board.to_owned(),
                    sample: Some(sample.clone()),
                    binary: DemoResource::Remote(artifacts.binary),
                    platform_description,
                    hardware_description,
                })
            }
            DemoTarget::LocalBinary(path) => {
                let path = std::fs::canonicalize(path)
                    .map_err(|e| RenodeRunError::file_system("resolve demo binary", path, e))?;
                self.resolve_binary(board, DemoResource::Local(path), save)
            }
            DemoTarget::RemoteBinary(url) => {
                self.resolve_binary(board, DemoResource::Remote(url.clone()), save)
            }
        }
    }

    /// User supplied binaries only need a platform, taken from the board's
    /// `hello_world` device tree.
    fn resolve_binary(
        &self,
        board: &str,
        binary: DemoResource,
        save: bool,
    ) -> RenodeRunResult<DemoSpec> {
        let artifacts = self.catalog.sample(board, PLATFORM_SAMPLE)?;
        let dir = if save { self.work_dir.as_path() } else { self.scratch.path() };
        let (dts, repl) = self.generate_platform(board, &artifacts.device_tree, dir)?;
        Ok(DemoSpec {
            board: board.to_owned(),
            sample: None,
            binary,
            platform_description: DemoResource::Local(repl),
            hardware_description: Some(dts),
        })
    }

    /// Write the Renode script for `spec` to the scratch directory.
    pub fn write_script(&self, spec: &DemoSpec) -> RenodeRunResult<PathBuf> {
        let path = self.scratch.path().join(format!("{}.resc", spec.board));
        std::fs::write(&path, render_script(spec))
            .map_err(|e| RenodeRunError::file_system("write demo script", &path, e))?;
        Ok(path)
    }

    /// Fetch the device tree into `<dir>/<board>.dts` and translate it to
    /// `<dir>/<board>.repl`.
    fn generate_platform(
        &self,
        board: &str,
        device_tree: &Url,
        dir: &Path,
    ) -> RenodeRunResult<(PathBuf, PathBuf)> {
        let dts = dir.join(format!("{board}.dts"));
        let repl = dir.join(format!("{board}.repl"));

        let text = self.catalog.fetch_text(device_tree)?;
        std::fs::write(&dts, text)
            .map_err(|e| RenodeRunError::file_system("write device tree", &dts, e))?;
        let description = self.translator.translate(&dts)?;
        std::fs::write(&repl, description)
            .map_err(|e| RenodeRunError::file_system("write platform description", &repl, e))?;

        crate::info!("Generated {} from {}", repl.display(), dts.display());
        Ok((dts, repl))
    }
}
