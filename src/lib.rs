//! renode-run – download and run [Renode](https://renode.io) without thinking about it
//! ====================================================================================
//!
//! ## Fully Managed
//! - **Cached Builds** – Nightly or pinned portable builds are fetched from
//!   `builds.renode.io` once and reused by every later invocation.
//! - **Multiple Versions & Variants** – Each runtime variant (`mono-portable`,
//!   `dotnet-portable`) and each version lives in its own directory.
//! - **Test Runner** – `renode-test` runs inside an isolated Python environment
//!   that is created once and reused.
//! - **Demos** – Zephyr samples from the Renode dashboard (or your own ELF) are
//!   started with a generated Renode script.
//!
//! ---
//!
//! ```rust,no_run
//! use renode_run::*;
//!
//! fn main() -> RenodeRunResult<()> {
//!     let config = RenodeRunConfig::builder()
//!         .artifacts_root(RenodeRunConfig::default_artifacts_root()?)
//!         .build();
//!
//!     let store = ArtifactStore::new(&config, CacheLayout::Versioned);
//!     let entry = store.locate_or_download(RenodeVariant::MonoPortable)?;
//!
//!     let code = Launcher::new(&config).run(&entry, &["--console".to_string()], EntryPoint::Main)?;
//!     std::process::exit(code);
//! }
//! ```
//!
//! ---
//!
//! ## How It Works
//!
//! ```text
//! renode-run CLI
//!       │
//!       ├─→ VersionResolver   (version → remote archive URL)
//!       │         ↓
//!       ├─→ ArtifactCache     (variant × version → directory)
//!       │         ↓  miss
//!       ├─→ Downloader        (stream, extract, clean up)
//!       │         ↓
//!       └─→ Launcher          (renode / renode-test, exit code passthrough)
//! ```
//!
//! ## Cache Layout
//!
//! ```text
//! ~/.config/renode/
//! ├── renode-run.download/
//! │   └── mono-portable/
//! │       ├── renode-1.15.3+20240924gitc7bc336bb/   # versioned
//! │       └── renode-1.15.3+20241005git8ce1d3ba3/
//! └── renode-run.venv/                              # renode-test environment
//! ```

#[allow(unused_imports)]
use tracing::{debug, error, info, span, trace, warn, Level};

pub mod artifact;
pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod launch;
pub mod logging;

pub use artifact::{archive::*, cache::*, download::*, store::*, version::*};
pub use cli::*;
pub use config::*;
pub use demo::{catalog::*, script::*, translate::*, *};
pub use error::{RenodeRunError, RenodeRunResult};
pub use launch::{venv::*, *};
pub use logging::*;
