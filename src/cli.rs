//! Argument groups shared by the `renode-run` subcommands.

use std::path::PathBuf;

use url::Url;

use crate::{
    artifact::{cache::CacheLayout, version::RenodeVariant},
    config::RenodeRunConfig,
    error::RenodeRunResult,
};

/// Flags accepted before or after any subcommand.
#[derive(Debug, Clone, clap::Args)]
pub struct GlobalArgs {
    /// Root for downloads and the test environment [default: ~/.config/renode]
    #[arg(short = 'a', long, value_name = "PATH", global = true)]
    pub artifacts_path: Option<PathBuf>,

    /// Portable package flavour to use.
    #[arg(long, value_enum, default_value_t = RenodeVariant::default(), global = true)]
    pub renode_variant: RenodeVariant,

    /// More logging (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Host serving Renode packages.
    #[arg(long, value_name = "URL", hide = true, global = true)]
    pub builds_url: Option<Url>,

    /// Zephyr dashboard used by `demo`.
    #[arg(long, value_name = "URL", hide = true, global = true)]
    pub dashboard_url: Option<Url>,
}

impl GlobalArgs {
    /// Resolve defaults into an explicit configuration.
    pub fn config(&self) -> RenodeRunResult<RenodeRunConfig> {
        let artifacts_root = match &self.artifacts_path {
            Some(path) => path.clone(),
            None => RenodeRunConfig::default_artifacts_root()?,
        };
        let mut config = RenodeRunConfig::builder().artifacts_root(artifacts_root).build();
        if let Some(url) = &self.builds_url {
            config.builds_url = url.clone();
        }
        if let Some(url) = &self.dashboard_url {
            config.dashboard_url = url.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct DownloadArgs {
    /// Version to fetch, e.g. 1.15.3+20240924gitc7bc336bb [default: latest nightly]
    pub version: Option<String>,

    /// Download directory [default: <artifacts-path>/renode-run.download]
    #[arg(short, long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Store the package directly in <path>/<variant>, replacing what is there.
    #[arg(short = 'd', long)]
    pub no_version_dirs: bool,

    /// Download even if the version is already cached.
    #[arg(short, long)]
    pub force: bool,
}

impl DownloadArgs {
    pub fn layout(&self) -> CacheLayout {
        if self.no_version_dirs {
            CacheLayout::Flat
        } else {
            CacheLayout::Versioned
        }
    }
}

/// Everything after `--`, passed to the child untouched.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ForwardedArgs {
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct DemoArgs {
    /// Board to emulate, e.g. hifive1.
    #[arg(short, long)]
    pub board: String,

    /// Keep <board>.dts and a generated <board>.repl in the current directory.
    #[arg(short, long)]
    pub generate_repl: bool,

    /// Sample name, local .elf or URL of a binary.
    #[arg(default_value = crate::demo::DEFAULT_SAMPLE)]
    pub target: String,
}
