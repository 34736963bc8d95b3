/// One backup run from preflight to report

use chrono::{DateTime, Local};
use std::path::Path;
use std::time::Instant;

use crate::core::backup::BackupManager;
use crate::core::error::{BackupError, BackupResult};
use crate::core::model::RunLedger;
use crate::core::options::BackupConfig;
use crate::core::preflight;
use crate::core::report::{ReportEmitter, RunSummary};
use crate::core::run_log::RunLog;
use crate::core::runtime::VolumeRuntime;
use crate::utils::helpers::run_timestamp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// `--all` found nothing to back up
    NoVolumes,
    /// Dry run listed this many targets
    Planned(usize),
    Completed(RunSummary),
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::NoVolumes | RunOutcome::Planned(_) => 0,
            RunOutcome::Completed(summary) => summary.exit_code(),
        }
    }
}

pub struct App<'a, R> {
    runtime: &'a R,
    config: &'a BackupConfig,
    started_at: DateTime<Local>,
    timestamp: String,
}

impl<'a, R: VolumeRuntime> App<'a, R> {
    pub fn new(runtime: &'a R, config: &'a BackupConfig, started_at: DateTime<Local>) -> Self {
        Self {
            runtime,
            config,
            started_at,
            timestamp: run_timestamp(started_at),
        }
    }

    /// Timestamp shared by every artifact of this run
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Errors returned here end the run; per-volume failures are folded into
    /// the summary instead.
    pub async fn run(&self, log: &mut RunLog) -> BackupResult<RunOutcome> {
        let clock = Instant::now();

        log.section("Preflight");
        preflight::check_environment(self.runtime, log).await?;

        let targets = match preflight::resolve_targets(self.runtime, self.config, log).await {
            Ok(targets) => targets,
            Err(BackupError::NoVolumes) => {
                log.warning("No Docker volumes found, nothing to back up");
                return Ok(RunOutcome::NoVolumes);
            }
            Err(err) => return Err(err),
        };

        let manager = BackupManager::new(self.runtime, self.config, &self.timestamp);

        if self.config.dry_run {
            manager.plan(&targets, log).await;
            return Ok(RunOutcome::Planned(targets.len()));
        }

        log.commit()?;
        if let Some(path) = log.path().map(Path::to_path_buf) {
            log.info(format!("Log file: {}", path.display()));
        }

        preflight::prepare_output(self.runtime, self.config, log).await?;

        let mut ledger = RunLedger::default();
        manager.run(&targets, &mut ledger, log).await;

        let summary = ReportEmitter::new(self.config, self.started_at, &self.timestamp)
            .emit(&ledger, log, clock.elapsed())?;

        Ok(RunOutcome::Completed(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fake::{Call, FakeRuntime};
    use crate::utils::AppConfig;
    use chrono::TimeZone;

    fn config(args: &[&str], out: &Path) -> BackupConfig {
        let mut argv = vec!["volume-backup", "--out", out.to_str().unwrap()];
        argv.extend_from_slice(args);
        BackupConfig::from_args(argv, &AppConfig::default(), Path::new("/")).unwrap()
    }

    fn started_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 17, 14, 22, 33).unwrap()
    }

    #[tokio::test]
    async fn test_pgdata_stop_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&["--volume", "pgdata", "--stop"], dir.path());
        let runtime = FakeRuntime::new(&["pgdata"]).with_dependents("pgdata", &["web1"]);
        let mut log = RunLog::silent();

        let outcome = App::new(&runtime, &config, started_at()).run(&mut log).await.unwrap();

        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(runtime.stops(), vec!["web1"]);
        assert_eq!(runtime.starts(), vec!["web1"]);
        assert!(dir.path().join("pgdata_20261017_142233.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_all_with_one_failed_archive_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&["--all", "--json"], dir.path());
        let runtime = FakeRuntime::new(&["a", "b"]);
        runtime.fail_archive("b");
        let mut log = RunLog::silent();

        let outcome = App::new(&runtime, &config, started_at()).run(&mut log).await.unwrap();

        assert_eq!(outcome.exit_code(), 1);
        match outcome {
            RunOutcome::Completed(summary) => {
                assert_eq!(summary.succeeded_count, 1);
                assert_eq!(summary.total_volumes, 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(dir.path().join("a_20261017_142233.tar.gz").exists());
        assert!(!config.summary_file_path("20261017_142233").exists());
    }

    #[tokio::test]
    async fn test_missing_volume_fails_before_touching_anything() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("backups");
        let config = config(&["--volume", "missing_vol"], &out);
        let runtime = FakeRuntime::new(&["pgdata"]);
        let mut log = RunLog::silent();

        let err = App::new(&runtime, &config, started_at()).run(&mut log).await.unwrap_err();

        assert!(matches!(err, BackupError::NotFound(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(!runtime.mutated());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_missing_volume_log_holds_only_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&["--volume", "missing_vol"], &dir.path().join("backups"));
        let log_path = config.log_file_path("20261017_142233");
        let runtime = FakeRuntime::new(&["pgdata"]);
        let mut log = RunLog::deferred(&log_path).without_echo();

        let err = App::new(&runtime, &config, started_at()).run(&mut log).await.unwrap_err();
        log.error(err.to_string());
        drop(log);

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("[ERROR] volume 'missing_vol' does not exist"));
        assert_eq!(std::fs::read_dir(log_path.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_completed_run_log_keeps_preflight_lines() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&["--volume", "pgdata"], dir.path());
        let log_path = config.log_file_path("20261017_142233");
        let runtime = FakeRuntime::new(&["pgdata"]);
        let mut log = RunLog::deferred(&log_path).without_echo();

        App::new(&runtime, &config, started_at()).run(&mut log).await.unwrap();
        drop(log);

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.lines().next().unwrap().ends_with("[SECTION] Preflight"));
        assert!(contents.contains("[SUCCESS] Docker daemon is reachable"));
        assert!(contents.contains(&format!("[INFO] Log file: {}", log_path.display())));
        assert!(contents.contains("[SUCCESS] Archived pgdata"));
    }

    #[tokio::test]
    async fn test_zero_volumes_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&["--all"], dir.path());
        let runtime = FakeRuntime::new(&[]);
        let mut log = RunLog::silent();

        let outcome = App::new(&runtime, &config, started_at()).run(&mut log).await.unwrap();

        assert_eq!(outcome, RunOutcome::NoVolumes);
        assert_eq!(outcome.exit_code(), 0);
        assert!(!runtime.calls().iter().any(|c| matches!(c, Call::ContainersUsing(_))));
    }

    #[tokio::test]
    async fn test_dry_run_exits_zero_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("backups");
        let config = config(&["--all", "--stop", "--dry-run"], &out);
        let runtime = FakeRuntime::new(&["a", "b"]).with_dependents("a", &["web1"]);
        let mut log = RunLog::silent();

        let outcome = App::new(&runtime, &config, started_at()).run(&mut log).await.unwrap();

        assert_eq!(outcome, RunOutcome::Planned(2));
        assert_eq!(outcome.exit_code(), 0);
        assert!(!runtime.mutated());
        assert!(!runtime.calls().iter().any(|c| matches!(c, Call::EnsureImage(_))));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_environment_failure_stops_before_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&["--all"], dir.path());
        let runtime = FakeRuntime::new(&["a"]);
        runtime.fail_ping();
        let mut log = RunLog::silent();

        let err = App::new(&runtime, &config, started_at()).run(&mut log).await.unwrap_err();

        assert!(matches!(err, BackupError::Environment(_)));
        assert!(!runtime.calls().contains(&Call::ListVolumes));
    }

    #[test]
    fn test_timestamp_from_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&["--all"], dir.path());
        let runtime = FakeRuntime::new(&[]);
        assert_eq!(App::new(&runtime, &config, started_at()).timestamp(), "20261017_142233");
    }
}
