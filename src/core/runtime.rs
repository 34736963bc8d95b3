/// Container runtime interface used by a backup run
///
/// Everything the tool needs from Docker goes through `VolumeRuntime`, so the
/// orchestration can be exercised against an in-memory runtime in tests.

use anyhow::Result;
use std::path::PathBuf;

use crate::utils::constants::{HELPER_BACKUP_MOUNT, HELPER_VOLUME_MOUNT};

/// Everything the helper container needs to archive one volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub volume: String,
    /// Absolute host directory the archive lands in
    pub output_dir: PathBuf,
    pub file_name: String,
    pub image: String,
    /// uid/gid the finished archive is handed to
    pub owner: Option<(u32, u32)>,
}

impl ArchiveRequest {
    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }

    /// Volume read-only, output directory writable
    pub fn binds(&self) -> Vec<String> {
        vec![
            format!("{}:{}:ro", self.volume, HELPER_VOLUME_MOUNT),
            format!("{}:{}", self.output_dir.display(), HELPER_BACKUP_MOUNT),
        ]
    }

    /// Shell command run inside the helper. Volume names are validated
    /// against Docker's grammar before they get here. The umask makes tar
    /// create the archive owner-only, so a half-written file is never
    /// readable by others.
    pub fn helper_command(&self) -> Vec<String> {
        let target = format!("{}/{}", HELPER_BACKUP_MOUNT, self.file_name);
        let mut script = format!(
            "umask 077 && tar czf {target} -C {src} . && chmod 600 {target}",
            target = target,
            src = HELPER_VOLUME_MOUNT
        );
        if let Some((uid, gid)) = self.owner {
            script.push_str(&format!(" && chown {}:{} {}", uid, gid, target));
        }
        vec!["sh".to_string(), "-c".to_string(), script]
    }
}

/// Query/command surface of the container runtime
#[allow(async_fn_in_trait)]
pub trait VolumeRuntime {
    /// Confirm the runtime CLI is installed; returns its version line
    async fn check_binary(&self) -> Result<String>;

    /// Confirm the daemon answers
    async fn ping(&self) -> Result<()>;

    /// All volume names, in the runtime's listing order
    async fn list_volumes(&self) -> Result<Vec<String>>;

    async fn volume_exists(&self, name: &str) -> Result<bool>;

    /// Names of running containers that mount `volume`
    async fn containers_using_volume(&self, volume: &str) -> Result<Vec<String>>;

    async fn stop_container(&self, name: &str) -> Result<()>;

    async fn start_container(&self, name: &str) -> Result<()>;

    /// Make sure the helper image is available locally
    async fn ensure_image(&self, image: &str) -> Result<()>;

    /// Run the helper container to completion. Ok means it exited 0.
    async fn archive_volume(&self, request: &ArchiveRequest) -> Result<()>;
}
