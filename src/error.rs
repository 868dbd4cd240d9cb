use std::path::PathBuf;
use thiserror::Error;

/// Every failure a run can produce.
///
/// Only `ConfigLoad` is fatal to a run. The remaining variants describe the
/// failure of a single source or a single file and are folded into the log by
/// the caller.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    #[error("Failed to load settings: {0}")]
    Settings(String),

    #[error("Failed to fetch {url} after {attempts} attempt(s): {reason}")]
    SourceFetch {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Failed to write raw file {}: {source}", path.display())]
    SourceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown parsing strategy: '{0}'")]
    UnknownStrategy(String),

    #[error("Strategy '{strategy}' failed to parse {}: {reason}", path.display())]
    Parse {
        strategy: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to write parsed file {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, IngestError>;
