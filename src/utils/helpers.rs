/// Helper utilities for the backup CLI

use chrono::{DateTime, Local};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use crate::utils::constants::{ARCHIVE_EXTENSION, ARTIFACT_MODE, RUN_TIMESTAMP_FORMAT};

/// Format bytes to human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Timestamp shared by every artifact of one run, e.g. `20261017_142233`
pub fn run_timestamp(now: DateTime<Local>) -> String {
    now.format(RUN_TIMESTAMP_FORMAT).to_string()
}

/// `<volume>_<timestamp>.tar.gz`
pub fn archive_file_name(volume: &str, timestamp: &str) -> String {
    format!("{}_{}.{}", volume, timestamp, ARCHIVE_EXTENSION)
}

/// Docker's own volume name grammar. Anything else could escape the
/// output directory once embedded in the archive file name.
pub fn is_valid_volume_name(name: &str) -> bool {
    static VOLUME_NAME: OnceLock<Regex> = OnceLock::new();
    VOLUME_NAME
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("static regex"))
        .is_match(name)
}

/// Make `path` absolute against `cwd` and collapse `.` / `..` lexically.
/// Docker bind mounts reject relative host paths.
pub fn normalize_path(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Restrict a file to owner read/write
#[cfg(unix)]
pub fn set_owner_only(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(ARTIFACT_MODE))
}

#[cfg(not(unix))]
pub fn set_owner_only(path: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(false);
    fs::set_permissions(path, perms)
}

/// Open a file readable and writable by its owner only. `append` keeps
/// existing content; otherwise the file is truncated.
pub fn create_private_file(path: &Path, append: bool) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(ARTIFACT_MODE);
    }

    let file = options.open(path)?;
    // mode() only applies when the file is created
    set_owner_only(path)?;
    Ok(file)
}

/// Owner uid/gid of a directory, used to hand archives back to the caller
#[cfg(unix)]
pub fn dir_owner(path: &Path) -> Option<(u32, u32)> {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).ok().map(|m| (m.uid(), m.gid()))
}

#[cfg(not(unix))]
pub fn dir_owner(_path: &Path) -> Option<(u32, u32)> {
    None
}

/// Free space on the filesystem holding `path`, picking the disk with the
/// longest matching mount point
pub fn available_space(path: &Path) -> Option<u64> {
    use sysinfo::Disks;

    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// Check if a directory exists and is writable
pub fn is_dir_writable<P: AsRef<Path>>(path: P) -> bool {
    if let Ok(metadata) = fs::metadata(&path) {
        metadata.is_dir() && !metadata.permissions().readonly()
    } else {
        false
    }
}
