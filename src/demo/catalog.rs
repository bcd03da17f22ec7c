//! Board/sample lookup against the Zephyr simulation dashboard.
//!
//! ```text
//! <dashboard>/zephyr_sim/latest                                   -> zephyr version
//! <dashboard>/zephyr_sim/<zephyr>/latest                          -> renode version
//! <dashboard>/zephyr/<zephyr>/<board>/<sample>/<sample>.elf       binary
//! <dashboard>/zephyr/<zephyr>/<board>/<sample>/<sample>.dts       device tree
//! <dashboard>/zephyr_sim/<zephyr>/<renode>/<board>/<sample>/<sample>.repl
//! ```

use std::sync::OnceLock;

use serde::Serialize;
use url::Url;

use crate::{
    config::endpoint,
    error::{RenodeRunError, RenodeRunResult},
};

/// Remote files making up one prebuilt demo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SampleArtifacts {
    pub binary: Url,
    pub device_tree: Url,
    pub platform: Url,
}

pub trait DemoCatalog {
    /// Artifacts of `(board, sample)`, or [`RenodeRunError::DemoNotFound`].
    fn sample(&self, board: &str, sample: &str) -> RenodeRunResult<SampleArtifacts>;

    /// Download a text resource, e.g. a device tree.
    fn fetch_text(&self, url: &Url) -> RenodeRunResult<String>;
}

#[derive(Debug)]
pub struct DashboardCatalog {
    base: Url,
    zephyr_version: OnceLock<String>,
    renode_version: OnceLock<String>,
}

impl DashboardCatalog {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            zephyr_version: OnceLock::new(),
            renode_version: OnceLock::new(),
        }
    }

    /// Zephyr release the dashboard currently builds samples for.
    pub fn zephyr_version(&self) -> RenodeRunResult<&str> {
        if let Some(v) = self.zephyr_version.get() {
            return Ok(v.as_str());
        }
        let v = get_text(&endpoint(&self.base, &["zephyr_sim", "latest"])?)?;
        crate::debug!("Dashboard Zephyr version: {v}");
        Ok(self.zephyr_version.get_or_init(|| v).as_str())
    }

    /// Renode build the dashboard's platform descriptions were generated with.
    pub fn renode_version(&self) -> RenodeRunResult<&str> {
        if let Some(v) = self.renode_version.get() {
            return Ok(v.as_str());
        }
        let zephyr = self.zephyr_version()?;
        let v = get_text(&endpoint(&self.base, &["zephyr_sim", zephyr, "latest"])?)?;
        crate::debug!("Dashboard Renode version: {v}");
        Ok(self.renode_version.get_or_init(|| v).as_str())
    }

    fn sample_file(&self, zephyr: &str, board: &str, sample: &str, ext: &str) -> RenodeRunResult<Url> {
        endpoint(
            &self.base,
            &["zephyr", zephyr, board, sample, &format!("{sample}.{ext}")],
        )
    }
}

impl DemoCatalog for DashboardCatalog {
    fn sample(&self, board: &str, sample: &str) -> RenodeRunResult<SampleArtifacts> {
        let zephyr = self.zephyr_version()?;
        let binary = self.sample_file(zephyr, board, sample, "elf")?;

        match ureq::head(binary.as_str()).call() {
            Ok(_) => {}
            Err(ureq::Error::StatusCode(404)) => {
                return Err(RenodeRunError::DemoNotFound {
                    board: board.to_owned(),
                    sample: sample.to_owned(),
                })
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RenodeRunError::network(&binary, format!("HTTP {code}")))
            }
            Err(e) => return Err(RenodeRunError::network(&binary, e)),
        }

        let renode = self.renode_version()?;
        let platform = endpoint(
            &self.base,
            &["zephyr_sim", zephyr, renode, board, sample, &format!("{sample}.repl")],
        )?;
        Ok(SampleArtifacts {
            device_tree: self.sample_file(zephyr, board, sample, "dts")?,
            binary,
            platform,
        })
    }

    fn fetch_text(&self, url: &Url) -> RenodeRunResult<String> {
        get_text(url)
    }
}

fn get_text(url: &Url) -> RenodeRunResult<String> {
    let resp = ureq::get(url.as_str()).call().map_err(|e| match e {
        ureq::Error::StatusCode(code) => RenodeRunError::network(url, format!("HTTP {code}")),
        other => RenodeRunError::network(url, other),
    })?;
    let text = resp
        .into_body()
        .read_to_string()
        .map_err(|e| RenodeRunError::network(url, e))?;
    Ok(text.trim().to_owned())
}
