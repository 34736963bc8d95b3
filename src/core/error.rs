/// Error taxonomy for a backup run
///
/// Configuration, environment and not-found errors end the run before any
/// volume is touched. Container and archive errors are per-volume: they are
/// recorded in the run ledger and the batch carries on.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("invalid options: {0}")]
    Configuration(String),

    #[error("{0}")]
    Environment(String),

    #[error("volume '{0}' does not exist")]
    NotFound(String),

    #[error("no Docker volumes found")]
    NoVolumes,

    #[error("failed to find containers using volume '{volume}': {reason}")]
    Discovery { volume: String, reason: String },

    #[error("failed to stop container '{container}': {reason}")]
    ContainerStop { container: String, reason: String },

    #[error("failed to start container '{container}': {reason}")]
    ContainerStart { container: String, reason: String },

    #[error("failed to archive volume '{volume}': {reason}")]
    Archive { volume: String, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write summary: {0}")]
    Report(#[from] serde_json::Error),
}

impl BackupError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackupError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for an error that ends the run.
    /// An empty volume list is a warning, so it still exits cleanly.
    pub fn exit_code(&self) -> u8 {
        match self {
            BackupError::NoVolumes => 0,
            _ => 1,
        }
    }
}

impl From<clap::Error> for BackupError {
    fn from(err: clap::Error) -> Self {
        // clap renders a multi-line usage block; the first line carries the cause
        let rendered = err.to_string();
        let first = rendered
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("error: ")
            .to_string();
        BackupError::Configuration(first)
    }
}

pub type BackupResult<T> = std::result::Result<T, BackupError>;
