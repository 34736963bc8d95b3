/// Values passed between the stages of a backup run

use std::path::PathBuf;

use crate::core::error::BackupError;

/// A volume selected for backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTarget {
    pub name: String,
}

impl BackupTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A running container that mounts the volume being backed up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentContainer {
    pub name: String,
    pub was_stopped: bool,
}

impl DependentContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            was_stopped: false,
        }
    }
}

/// Outcome of one volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub volume: String,
    pub archive_path: PathBuf,
    pub size_bytes: u64,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl BackupRecord {
    pub fn succeeded(volume: &str, archive_path: PathBuf, size_bytes: u64) -> Self {
        Self {
            volume: volume.to_string(),
            archive_path,
            size_bytes,
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(volume: &str, archive_path: PathBuf, error: &BackupError) -> Self {
        Self {
            volume: volume.to_string(),
            archive_path,
            size_bytes: 0,
            succeeded: false,
            error: Some(error.to_string()),
        }
    }
}

/// Accumulates everything one run produces. Owned by the caller and handed
/// to the orchestrator by reference, then to the report emitter.
#[derive(Debug, Default)]
pub struct RunLedger {
    pub records: Vec<BackupRecord>,
    /// Restart failures; these fail the run without failing the volume
    pub container_failures: Vec<BackupError>,
    /// Consistency warnings for volumes archived while in use
    pub warnings: Vec<String>,
}

impl RunLedger {
    pub fn record(&mut self, record: BackupRecord) {
        self.records.push(record);
    }

    pub fn any_failed(&self) -> bool {
        self.records.iter().any(|r| !r.succeeded) || !self.container_failures.is_empty()
    }

    pub fn successful(&self) -> impl Iterator<Item = &BackupRecord> {
        self.records.iter().filter(|r| r.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &BackupRecord> {
        self.records.iter().filter(|r| !r.succeeded)
    }
}
