/// Option resolution: turns parsed flags plus the config file into a
/// validated `BackupConfig`. Pure; nothing here touches Docker or the disk.

use clap::Parser;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::core::error::{BackupError, BackupResult};
use crate::utils::constants::{
    DEFAULT_BACKUP_DIR, DEFAULT_HELPER_IMAGE, DEFAULT_LOG_SUBDIR, DEFAULT_STOP_TIMEOUT_SECS,
    LOG_FILE_PREFIX, SUMMARY_FILE_PREFIX,
};
use crate::utils::helpers::{archive_file_name, is_valid_volume_name, normalize_path};
use crate::utils::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetMode {
    Single(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    pub target: TargetMode,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub stop_containers: bool,
    pub dry_run: bool,
    pub emit_json: bool,
    pub helper_image: String,
    pub stop_timeout_secs: u64,
}

impl BackupConfig {
    /// Parse a raw argument list (program name first) and resolve it
    pub fn from_args<I, T>(args: I, file: &AppConfig, cwd: &Path) -> BackupResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args)?;
        Self::resolve(&cli, file, cwd)
    }

    /// Validate the selection flags and fill every setting from
    /// flag > config file > default
    pub fn resolve(cli: &Cli, file: &AppConfig, cwd: &Path) -> BackupResult<Self> {
        let target = match (&cli.volume, cli.all) {
            (Some(_), true) => {
                return Err(BackupError::Configuration(
                    "--volume and --all cannot be used together".to_string(),
                ))
            }
            (None, false) => {
                return Err(BackupError::Configuration(
                    "specify either --volume <name> or --all".to_string(),
                ))
            }
            (Some(name), false) => {
                if !is_valid_volume_name(name) {
                    return Err(BackupError::Configuration(format!(
                        "'{}' is not a valid volume name",
                        name
                    )));
                }
                TargetMode::Single(name.clone())
            }
            (None, true) => TargetMode::All,
        };

        let output_dir = cli
            .out
            .clone()
            .or_else(|| file.backup_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR));
        let output_dir = normalize_path(&output_dir, cwd);

        let log_dir = match cli.log_dir.clone().or_else(|| file.log_dir.clone()) {
            Some(dir) => normalize_path(&dir, cwd),
            None => output_dir.join(DEFAULT_LOG_SUBDIR),
        };

        let stop_containers = if cli.stop || cli.no_stop {
            cli.stop_containers()
        } else {
            file.stop_containers.unwrap_or(false)
        };

        let helper_image = cli
            .image
            .clone()
            .or_else(|| file.helper_image.clone())
            .unwrap_or_else(|| DEFAULT_HELPER_IMAGE.to_string());
        if helper_image.trim().is_empty() {
            return Err(BackupError::Configuration(
                "helper image must not be empty".to_string(),
            ));
        }

        let stop_timeout_secs = cli
            .stop_timeout
            .or(file.stop_timeout_secs)
            .unwrap_or(DEFAULT_STOP_TIMEOUT_SECS);

        Ok(Self {
            target,
            output_dir,
            log_dir,
            stop_containers,
            dry_run: cli.dry_run,
            emit_json: cli.json,
            helper_image,
            stop_timeout_secs,
        })
    }

    pub fn archive_path(&self, volume: &str, timestamp: &str) -> PathBuf {
        self.output_dir.join(archive_file_name(volume, timestamp))
    }

    pub fn log_file_path(&self, timestamp: &str) -> PathBuf {
        self.log_dir.join(format!("{}_{}.log", LOG_FILE_PREFIX, timestamp))
    }

    pub fn summary_file_path(&self, timestamp: &str) -> PathBuf {
        self.log_dir.join(format!("{}_{}.json", SUMMARY_FILE_PREFIX, timestamp))
    }
}
