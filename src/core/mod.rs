pub mod backup;
pub mod docker;
pub mod error;
pub mod model;
pub mod options;
pub mod preflight;
pub mod report;
pub mod run_log;
pub mod runtime;

#[cfg(test)]
pub(crate) mod fake;

pub use backup::BackupManager;
pub use docker::DockerRuntime;
pub use error::{BackupError, BackupResult};
pub use model::{BackupRecord, BackupTarget, DependentContainer, RunLedger};
pub use options::{BackupConfig, TargetMode};
pub use report::{ReportEmitter, RunSummary};
pub use run_log::RunLog;
pub use runtime::{ArchiveRequest, VolumeRuntime};
