use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{RenodeRunError, RenodeRunResult};

/// Level for the number of `-v` flags: info, then debug, then trace.
pub fn level_for_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber: compact lines on stderr, filtered by
/// `RUST_LOG` when set and by `verbosity` otherwise.
///
/// Stdout stays free for the child process and the download summary.
pub fn init_logging(verbosity: u8) -> RenodeRunResult<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for_verbosity(verbosity).into())
        .from_env_lossy();

    let terminal_layer = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_target(verbosity > 0)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(terminal_layer)
        .try_init()
        .map_err(|e| RenodeRunError::InvalidConfig {
            field: "logging",
            reason: e.to_string(),
        })
}
