/// Run summary and the optional JSON artifact

use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{BackupError, BackupResult};
use crate::core::model::RunLedger;
use crate::core::options::BackupConfig;
use crate::core::run_log::RunLog;
use crate::utils::helpers::{create_private_file, format_bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub total_volumes: usize,
    pub succeeded_count: usize,
    pub total_size_bytes: u64,
    pub any_failed: bool,
}

impl RunSummary {
    pub fn from_ledger(ledger: &RunLedger) -> Self {
        Self {
            total_volumes: ledger.records.len(),
            succeeded_count: ledger.successful().count(),
            total_size_bytes: ledger.successful().map(|r| r.size_bytes).sum(),
            any_failed: ledger.any_failed(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        if self.any_failed {
            1
        } else {
            0
        }
    }
}

/// On-disk shape of `volume_backup_summary_<timestamp>.json`
#[derive(Debug, Serialize)]
pub struct SummaryDocument {
    pub timestamp: String,
    pub backup_dir: String,
    pub stop_containers: bool,
    pub volumes_backed_up: usize,
    pub total_size_bytes: u64,
    pub backups: Vec<SummaryEntry>,
    pub log_file: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryEntry {
    pub volume: String,
    pub file: String,
    pub size_bytes: u64,
}

impl SummaryDocument {
    pub fn new(
        ledger: &RunLedger,
        config: &BackupConfig,
        started_at: DateTime<Local>,
        log_file: Option<&Path>,
    ) -> Self {
        let summary = RunSummary::from_ledger(ledger);
        Self {
            timestamp: started_at.to_rfc3339(),
            backup_dir: config.output_dir.display().to_string(),
            stop_containers: config.stop_containers,
            volumes_backed_up: summary.succeeded_count,
            total_size_bytes: summary.total_size_bytes,
            backups: ledger
                .successful()
                .map(|r| SummaryEntry {
                    volume: r.volume.clone(),
                    file: r.archive_path.display().to_string(),
                    size_bytes: r.size_bytes,
                })
                .collect(),
            log_file: log_file.map(|p| p.display().to_string()),
        }
    }
}

pub struct ReportEmitter<'a> {
    config: &'a BackupConfig,
    started_at: DateTime<Local>,
    timestamp: &'a str,
}

impl<'a> ReportEmitter<'a> {
    pub fn new(config: &'a BackupConfig, started_at: DateTime<Local>, timestamp: &'a str) -> Self {
        Self {
            config,
            started_at,
            timestamp,
        }
    }

    /// Log the outcome and, for a clean run with `--json`, write the summary.
    /// The caller turns `any_failed` into the exit code.
    pub fn emit(&self, ledger: &RunLedger, log: &mut RunLog, elapsed: Duration) -> BackupResult<RunSummary> {
        let summary = RunSummary::from_ledger(ledger);
        log.section("Summary");

        for warning in &ledger.warnings {
            log.warning(warning.clone());
        }

        // Whole seconds read better than humantime's nanosecond breakdown
        let elapsed = humantime::format_duration(Duration::from_secs(elapsed.as_secs()));

        if summary.any_failed {
            for record in ledger.failed() {
                log.error(format!(
                    "{}: {}",
                    record.volume,
                    record.error.as_deref().unwrap_or("failed")
                ));
            }
            for failure in &ledger.container_failures {
                log.error(failure.to_string());
            }
            log.error(format!(
                "Backup finished with failures: {}/{} volume(s) archived ({}) in {}",
                summary.succeeded_count,
                summary.total_volumes,
                format_bytes(summary.total_size_bytes),
                elapsed
            ));
            return Ok(summary);
        }

        log.success(format!(
            "Backed up {} volume(s), {} total, in {}",
            summary.succeeded_count,
            format_bytes(summary.total_size_bytes),
            elapsed
        ));

        if self.config.emit_json {
            let document = SummaryDocument::new(ledger, self.config, self.started_at, log.path());
            let path = self.write_summary(&document)?;
            log.info(format!("Summary written to {}", path.display()));
        }

        Ok(summary)
    }

    fn write_summary(&self, document: &SummaryDocument) -> BackupResult<PathBuf> {
        let path = self.config.summary_file_path(self.timestamp);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BackupError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(document)?;
        let mut file = create_private_file(&path, false).map_err(|e| BackupError::io(&path, e))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|e| BackupError::io(&path, e))?;

        Ok(path)
    }
}
