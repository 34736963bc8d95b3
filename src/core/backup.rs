/// Volume backup orchestration
///
/// Volumes are processed one at a time: discover the containers using the
/// volume, optionally stop them, archive the volume through a helper
/// container, then restart whatever was stopped. A failure in one volume is
/// recorded and the next volume still runs.
///
/// Restart is tied to the stop: every container stopped for a volume gets a
/// restart attempt before the next volume starts, whether or not the archive
/// succeeded. A container whose stop failed was never marked stopped and is
/// not restarted.

use std::fs;
use std::path::Path;

use crate::core::error::{BackupError, BackupResult};
use crate::core::model::{BackupRecord, BackupTarget, DependentContainer, RunLedger};
use crate::core::options::BackupConfig;
use crate::core::run_log::RunLog;
use crate::core::runtime::{ArchiveRequest, VolumeRuntime};
use crate::utils::helpers::{archive_file_name, dir_owner, format_bytes, set_owner_only};

/// Containers stopped for the current volume, in stop order.
/// Must be handed to `BackupManager::restore` on every path out of a volume.
#[must_use]
#[derive(Debug, Default)]
pub struct StoppedContainers {
    containers: Vec<DependentContainer>,
}

impl StoppedContainers {
    fn push(&mut self, mut container: DependentContainer) {
        container.was_stopped = true;
        self.containers.push(container);
    }

    pub fn names(&self) -> Vec<&str> {
        self.containers.iter().map(|c| c.name.as_str()).collect()
    }
}

pub struct BackupManager<'a, R> {
    runtime: &'a R,
    config: &'a BackupConfig,
    timestamp: &'a str,
}

impl<'a, R: VolumeRuntime> BackupManager<'a, R> {
    pub fn new(runtime: &'a R, config: &'a BackupConfig, timestamp: &'a str) -> Self {
        Self {
            runtime,
            config,
            timestamp,
        }
    }

    /// Back up every target in order, recording each outcome in `ledger`
    pub async fn run(&self, targets: &[BackupTarget], ledger: &mut RunLedger, log: &mut RunLog) {
        let total = targets.len();
        for (index, target) in targets.iter().enumerate() {
            log.section(format!("Volume {}/{}: {}", index + 1, total, target.name));
            self.backup_volume(target, ledger, log).await;
        }
    }

    /// Print what a real run would do. Only read-only queries are made.
    pub async fn plan(&self, targets: &[BackupTarget], log: &mut RunLog) {
        log.section("Dry run: no containers or files will be touched");
        for target in targets {
            let archive = self.config.archive_path(&target.name, self.timestamp);
            log.info(format!("Would back up {} -> {}", target.name, archive.display()));

            match self.runtime.containers_using_volume(&target.name).await {
                Ok(dependents) if dependents.is_empty() => {
                    log.info("  no running containers use this volume");
                }
                Ok(dependents) if self.config.stop_containers => {
                    log.info(format!("  would stop and restart: {}", dependents.join(", ")));
                }
                Ok(dependents) => {
                    log.info(format!(
                        "  in use by {} (left running, --stop not set)",
                        dependents.join(", ")
                    ));
                }
                Err(e) => log.warning(format!("  could not list containers using {}: {:#}", target.name, e)),
            }
        }
        log.info(format!(
            "{} volume(s) planned, stop containers: {}",
            targets.len(),
            if self.config.stop_containers { "yes" } else { "no" }
        ));
    }

    async fn backup_volume(&self, target: &BackupTarget, ledger: &mut RunLedger, log: &mut RunLog) {
        let archive_path = self.config.archive_path(&target.name, self.timestamp);
        let mut stopped = StoppedContainers::default();

        let outcome = self
            .quiesce_and_archive(target, &archive_path, &mut stopped, ledger, log)
            .await;

        self.restore(stopped, ledger, log).await;

        match outcome {
            Ok(size) => {
                ledger.record(BackupRecord::succeeded(&target.name, archive_path, size));
            }
            Err(err) => {
                log.error(err.to_string());
                ledger.record(BackupRecord::failed(&target.name, archive_path, &err));
            }
        }
    }

    /// Everything between acquiring and releasing the stopped containers.
    /// Containers are added to `stopped` as soon as each stop succeeds.
    async fn quiesce_and_archive(
        &self,
        target: &BackupTarget,
        archive_path: &Path,
        stopped: &mut StoppedContainers,
        ledger: &mut RunLedger,
        log: &mut RunLog,
    ) -> BackupResult<u64> {
        let dependents: Vec<DependentContainer> = self
            .runtime
            .containers_using_volume(&target.name)
            .await
            .map_err(|e| BackupError::Discovery {
                volume: target.name.clone(),
                reason: format!("{:#}", e),
            })?
            .into_iter()
            .map(DependentContainer::new)
            .collect();

        if dependents.is_empty() {
            log.info("No running containers use this volume");
        } else if self.config.stop_containers {
            for container in dependents {
                log.info(format!("Stopping container {}", container.name));
                self.runtime
                    .stop_container(&container.name)
                    .await
                    .map_err(|e| BackupError::ContainerStop {
                        container: container.name.clone(),
                        reason: format!("{:#}", e),
                    })?;
                stopped.push(container);
            }
            log.success(format!("Stopped: {}", stopped.names().join(", ")));
        } else {
            let names: Vec<&str> = dependents.iter().map(|c| c.name.as_str()).collect();
            let warning = format!(
                "Volume {} is in use by {}; archiving while running, data may be inconsistent (use --stop)",
                target.name,
                names.join(", ")
            );
            log.warning(warning.clone());
            ledger.warnings.push(warning);
        }

        let size = self.archive(target, archive_path).await?;
        log.success(format!(
            "Archived {} -> {} ({})",
            target.name,
            archive_path.display(),
            format_bytes(size)
        ));
        Ok(size)
    }

    /// Run the helper, then check and harden the artifact it left behind.
    /// A failed attempt leaves no file at `archive_path`.
    async fn archive(&self, target: &BackupTarget, archive_path: &Path) -> BackupResult<u64> {
        let archive_error = |reason: String| BackupError::Archive {
            volume: target.name.clone(),
            reason,
        };

        if archive_path.exists() {
            return Err(archive_error(format!(
                "{} already exists, refusing to overwrite",
                archive_path.display()
            )));
        }

        let request = ArchiveRequest {
            volume: target.name.clone(),
            output_dir: self.config.output_dir.clone(),
            file_name: archive_file_name(&target.name, self.timestamp),
            image: self.config.helper_image.clone(),
            owner: dir_owner(&self.config.output_dir),
        };

        let result = self.run_helper(&request, archive_path).await;
        if let Err(reason) = &result {
            // The existence check above means any file here is this run's
            // partial output
            if archive_path.exists() {
                if let Err(e) = fs::remove_file(archive_path) {
                    return Err(archive_error(format!(
                        "{}; partial archive {} could not be removed: {}",
                        reason,
                        archive_path.display(),
                        e
                    )));
                }
            }
        }
        result.map_err(archive_error)
    }

    async fn run_helper(&self, request: &ArchiveRequest, archive_path: &Path) -> Result<u64, String> {
        self.runtime
            .archive_volume(request)
            .await
            .map_err(|e| format!("{:#}", e))?;

        let metadata = fs::metadata(archive_path)
            .map_err(|e| format!("archive missing after helper exited: {}", e))?;

        if !is_owner_only(&metadata) {
            set_owner_only(archive_path)
                .map_err(|e| format!("cannot restrict archive permissions: {}", e))?;
        }

        Ok(metadata.len())
    }

    /// Restart every stopped container in stop order. Failures are recorded
    /// and the remaining restarts are still attempted. Containers never
    /// marked stopped are left alone.
    async fn restore(&self, stopped: StoppedContainers, ledger: &mut RunLedger, log: &mut RunLog) {
        for container in stopped.containers.into_iter().filter(|c| c.was_stopped) {
            log.info(format!("Restarting container {}", container.name));
            match self.runtime.start_container(&container.name).await {
                Ok(()) => log.success(format!("Restarted {}", container.name)),
                Err(e) => {
                    let err = BackupError::ContainerStart {
                        container: container.name.clone(),
                        reason: format!("{:#}", e),
                    };
                    log.error(err.to_string());
                    ledger.container_failures.push(err);
                }
            }
        }
    }
}

#[cfg(unix)]
fn is_owner_only(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o077 == 0
}

#[cfg(not(unix))]
fn is_owner_only(_metadata: &fs::Metadata) -> bool {
    true
}
