//! In-memory runtime for tests. Records every call in order and fails the
//! operations it is told to fail.

use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::core::runtime::{ArchiveRequest, VolumeRuntime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CheckBinary,
    Ping,
    ListVolumes,
    VolumeExists(String),
    ContainersUsing(String),
    Stop(String),
    Start(String),
    EnsureImage(String),
    Archive(String),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    fail_binary: bool,
    fail_ping: bool,
    fail_discovery: HashSet<String>,
    fail_stop: HashSet<String>,
    fail_start: HashSet<String>,
    fail_archive: HashSet<String>,
    truncate_archive: HashSet<String>,
}

pub struct FakeRuntime {
    volumes: Vec<String>,
    dependents: HashMap<String, Vec<String>>,
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new(volumes: &[&str]) -> Self {
        Self {
            volumes: volumes.iter().map(|v| v.to_string()).collect(),
            dependents: HashMap::new(),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_dependents(mut self, volume: &str, containers: &[&str]) -> Self {
        self.dependents.insert(
            volume.to_string(),
            containers.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn fail_binary(&self) {
        self.state.lock().unwrap().fail_binary = true;
    }

    pub fn fail_ping(&self) {
        self.state.lock().unwrap().fail_ping = true;
    }

    pub fn fail_discovery(&self, volume: &str) {
        self.state.lock().unwrap().fail_discovery.insert(volume.to_string());
    }

    pub fn fail_stop(&self, container: &str) {
        self.state.lock().unwrap().fail_stop.insert(container.to_string());
    }

    pub fn fail_start(&self, container: &str) {
        self.state.lock().unwrap().fail_start.insert(container.to_string());
    }

    pub fn fail_archive(&self, volume: &str) {
        self.state.lock().unwrap().fail_archive.insert(volume.to_string());
    }

    /// The helper writes part of the archive for `volume`, then fails
    pub fn truncate_archive(&self, volume: &str) {
        self.state.lock().unwrap().truncate_archive.insert(volume.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Containers a stop was attempted on, in order
    pub fn stops(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Stop(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Containers a start was attempted on, in order
    pub fn starts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Start(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// True if any call could have changed container or file state
    pub fn mutated(&self) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, Call::Stop(_) | Call::Start(_) | Call::Archive(_)))
    }

    fn push(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl VolumeRuntime for FakeRuntime {
    async fn check_binary(&self) -> Result<String> {
        self.push(Call::CheckBinary);
        if self.state.lock().unwrap().fail_binary {
            return Err(anyhow!("docker binary not found in PATH"));
        }
        Ok("Docker version 27.1.1, build 6312585".to_string())
    }

    async fn ping(&self) -> Result<()> {
        self.push(Call::Ping);
        if self.state.lock().unwrap().fail_ping {
            return Err(anyhow!("Cannot connect to the Docker daemon"));
        }
        Ok(())
    }

    async fn list_volumes(&self) -> Result<Vec<String>> {
        self.push(Call::ListVolumes);
        Ok(self.volumes.clone())
    }

    async fn volume_exists(&self, name: &str) -> Result<bool> {
        self.push(Call::VolumeExists(name.to_string()));
        Ok(self.volumes.iter().any(|v| v == name))
    }

    async fn containers_using_volume(&self, volume: &str) -> Result<Vec<String>> {
        self.push(Call::ContainersUsing(volume.to_string()));
        if self.state.lock().unwrap().fail_discovery.contains(volume) {
            return Err(anyhow!("daemon returned 500"));
        }
        Ok(self.dependents.get(volume).cloned().unwrap_or_default())
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.push(Call::Stop(name.to_string()));
        if self.state.lock().unwrap().fail_stop.contains(name) {
            return Err(anyhow!("container {} did not stop", name));
        }
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.push(Call::Start(name.to_string()));
        if self.state.lock().unwrap().fail_start.contains(name) {
            return Err(anyhow!("container {} failed to start", name));
        }
        Ok(())
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        self.push(Call::EnsureImage(image.to_string()));
        Ok(())
    }

    async fn archive_volume(&self, request: &ArchiveRequest) -> Result<()> {
        self.push(Call::Archive(request.volume.clone()));
        if self.state.lock().unwrap().fail_archive.contains(&request.volume) {
            return Err(anyhow!("helper exited with status 2: tar: short write"));
        }
        if self.state.lock().unwrap().truncate_archive.contains(&request.volume) {
            let path = request.archive_path();
            std::fs::write(&path, "truncated")?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))?;
            }
            return Err(anyhow!("helper exited with status 1: tar: short write"));
        }
        // Written with default permissions so callers have to harden it
        std::fs::write(request.archive_path(), format!("archive of {}", request.volume))?;
        Ok(())
    }
}
