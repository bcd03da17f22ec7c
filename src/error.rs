// top-level error for the public API

use crate::artifact::version::RenodeVariant;

#[derive(serde::Serialize, Debug, thiserror::Error)]
pub enum RenodeRunError {
    #[error(
        "invalid Renode version `{version}`: expected <major>.<minor>.<patch>+<YYYYMMDD>git<commit>, e.g. 1.15.3+20240924gitc7bc336bb"
    )]
    InvalidVersionFormat { version: String },

    /// Cache miss. Callers recover from this by downloading.
    #[error("no cached Renode ({variant}) found in {}", path.display())]
    NotFound {
        variant: RenodeVariant,
        path: std::path::PathBuf,
    },

    #[error("failed to download {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("failed to extract {}: {reason}", archive.display())]
    Extraction {
        archive: std::path::PathBuf,
        reason: String,
    },

    #[error("demo `{sample}` is not available for board `{board}`")]
    DemoNotFound { board: String, sample: String },

    #[error("{what} is unavailable on {os}/{arch}: {reason}")]
    Unsupported {
        what: &'static str,
        /// `std::env::consts::OS`
        os: &'static str,
        /// `std::env::consts::ARCH`
        arch: &'static str,
        reason: String,
    },

    #[error("invalid {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("failed to {action} `{program}`: {reason}")]
    Process {
        action: &'static str,
        program: String,
        reason: String,
    },

    #[error("{operation} failed for '{}'", path.display())]
    FileSystem {
        operation: &'static str,
        path: std::path::PathBuf,
        #[source]
        #[serde(serialize_with = "std_io_error_to_string")]
        source: std::io::Error,
    },
}

pub type RenodeRunResult<T> = std::result::Result<T, RenodeRunError>;

impl RenodeRunError {
    pub fn file_system(
        operation: &'static str,
        path: impl Into<std::path::PathBuf>,
        err: impl Into<std::io::Error>,
    ) -> Self {
        Self::FileSystem {
            operation,
            path: path.into(),
            source: err.into(),
        }
    }

    pub fn network(url: impl ToString, reason: impl ToString) -> Self {
        Self::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn extraction(archive: impl Into<std::path::PathBuf>, reason: impl ToString) -> Self {
        Self::Extraction {
            archive: archive.into(),
            reason: reason.to_string(),
        }
    }

    pub fn process(
        action: &'static str,
        program: impl AsRef<std::path::Path>,
        reason: impl ToString,
    ) -> Self {
        Self::Process {
            action,
            program: program.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// `true` for a cache miss, the only error the CLI recovers from on its own.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub(crate) fn std_io_error_to_string<S>(e: &impl std::fmt::Display, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&e.to_string())
}
