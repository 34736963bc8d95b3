/// Preflight checks: runtime availability and target resolution

use std::fs;

use crate::core::error::{BackupError, BackupResult};
use crate::core::model::BackupTarget;
use crate::core::options::{BackupConfig, TargetMode};
use crate::core::run_log::RunLog;
use crate::core::runtime::VolumeRuntime;
use crate::utils::helpers::{available_space, format_bytes, is_dir_writable};

/// Docker CLI installed and daemon reachable
pub async fn check_environment<R: VolumeRuntime>(runtime: &R, log: &mut RunLog) -> BackupResult<()> {
    let version = runtime
        .check_binary()
        .await
        .map_err(|e| BackupError::Environment(format!("{:#}", e)))?;
    log.info(version);

    runtime
        .ping()
        .await
        .map_err(|e| BackupError::Environment(format!("{:#}", e)))?;
    log.success("Docker daemon is reachable");

    Ok(())
}

/// Volumes to back up, in the runtime's listing order
pub async fn resolve_targets<R: VolumeRuntime>(
    runtime: &R,
    config: &BackupConfig,
    log: &mut RunLog,
) -> BackupResult<Vec<BackupTarget>> {
    match &config.target {
        TargetMode::All => {
            let volumes = runtime
                .list_volumes()
                .await
                .map_err(|e| BackupError::Environment(format!("{:#}", e)))?;
            if volumes.is_empty() {
                return Err(BackupError::NoVolumes);
            }
            log.info(format!("Found {} volume(s): {}", volumes.len(), volumes.join(", ")));
            Ok(volumes.into_iter().map(BackupTarget::new).collect())
        }
        TargetMode::Single(name) => {
            let exists = runtime
                .volume_exists(name)
                .await
                .map_err(|e| BackupError::Environment(format!("{:#}", e)))?;
            if !exists {
                return Err(BackupError::NotFound(name.clone()));
            }
            log.info(format!("Volume {} found", name));
            Ok(vec![BackupTarget::new(name.clone())])
        }
    }
}

/// Output directory and helper image, ready for the first archive.
/// Not called for dry runs.
pub async fn prepare_output<R: VolumeRuntime>(
    runtime: &R,
    config: &BackupConfig,
    log: &mut RunLog,
) -> BackupResult<()> {
    fs::create_dir_all(&config.output_dir).map_err(|e| {
        BackupError::Environment(format!(
            "cannot create backup directory {}: {}",
            config.output_dir.display(),
            e
        ))
    })?;
    if !is_dir_writable(&config.output_dir) {
        return Err(BackupError::Environment(format!(
            "backup directory {} is not writable",
            config.output_dir.display()
        )));
    }
    log.info(format!("Backup directory: {}", config.output_dir.display()));

    if let Some(free) = available_space(&config.output_dir) {
        log.info(format!("Free space on backup filesystem: {}", format_bytes(free)));
    }

    runtime
        .ensure_image(&config.helper_image)
        .await
        .map_err(|e| BackupError::Environment(format!("{:#}", e)))?;
    log.info(format!("Helper image: {}", config.helper_image));

    Ok(())
}
