/// Defaults and fixed names used across a backup run

/// Default archive directory, relative to the working directory
pub const DEFAULT_BACKUP_DIR: &str = "volume-backups";

/// Log directory name used under the backup directory when none is given
pub const DEFAULT_LOG_SUBDIR: &str = "logs";

/// Image for the helper container; only needs `sh`, `tar` and `gzip`
pub const DEFAULT_HELPER_IMAGE: &str = "alpine:latest";

/// Grace period Docker gives a container before killing it on stop
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 30;

/// Mount points inside the helper container
pub const HELPER_VOLUME_MOUNT: &str = "/volume";
pub const HELPER_BACKUP_MOUNT: &str = "/backup";

/// Prefix for helper container names so leftovers are easy to spot
pub const HELPER_NAME_PREFIX: &str = "volume-backup-helper";

/// Owner read/write only, applied to every artifact the run produces
pub const ARTIFACT_MODE: u32 = 0o600;

/// Timestamp embedded in every artifact name of one run
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Timestamp prefix of each run log line
pub const LOG_LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const ARCHIVE_EXTENSION: &str = "tar.gz";
pub const LOG_FILE_PREFIX: &str = "volume_backup";
pub const SUMMARY_FILE_PREFIX: &str = "volume_backup_summary";

/// Config directory name under the platform config dir
pub const CONFIG_DIR_NAME: &str = "volume-backup";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_mode_is_owner_only() {
        assert_eq!(ARTIFACT_MODE & 0o077, 0);
        assert_eq!(ARTIFACT_MODE & 0o600, 0o600);
    }

    #[test]
    fn test_helper_mounts_are_absolute() {
        assert!(HELPER_VOLUME_MOUNT.starts_with('/'));
        assert!(HELPER_BACKUP_MOUNT.starts_with('/'));
        assert_ne!(HELPER_VOLUME_MOUNT, HELPER_BACKUP_MOUNT);
    }
}
