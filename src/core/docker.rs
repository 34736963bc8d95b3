/// Docker integration
///
/// Implements `VolumeRuntime` over the Docker Engine API, plus the `docker`
/// CLI for the installation check.

use anyhow::{anyhow, bail, Context, Result};
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::volume::ListVolumesOptions;
use bollard::Docker;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;

use crate::core::runtime::{ArchiveRequest, VolumeRuntime};
use crate::utils::constants::HELPER_NAME_PREFIX;

/// Lines of helper output kept for error messages
const HELPER_LOG_TAIL: &str = "20";

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
    stop_timeout: i64,
}

impl DockerRuntime {
    /// Create a client for the local daemon. This does not contact the
    /// daemon yet; `ping` does.
    pub fn connect(stop_timeout_secs: u64) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon. Is Docker running?")?;

        Ok(Self {
            docker,
            stop_timeout: i64::try_from(stop_timeout_secs).unwrap_or(i64::MAX),
        })
    }

    async fn run_helper(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start helper container")?;

        let mut wait = self.docker.wait_container(id, None::<WaitContainerOptions<String>>);
        let mut status = None;
        while let Some(item) = wait.next().await {
            match item {
                Ok(response) => status = Some(response.status_code),
                // bollard reports non-zero exits as an error item
                Err(DockerError::DockerContainerWaitError { code, .. }) => status = Some(code),
                Err(e) => return Err(e).context("Failed waiting for helper container"),
            }
        }

        match status {
            Some(0) => Ok(()),
            Some(code) => {
                let output = self.helper_output(id).await;
                if output.is_empty() {
                    bail!("helper exited with status {}", code)
                } else {
                    bail!("helper exited with status {}: {}", code, output)
                }
            }
            None => bail!("helper container reported no exit status"),
        }
    }

    /// Tail of the helper's stdout/stderr, best effort
    async fn helper_output(&self, id: &str) -> String {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: HELPER_LOG_TAIL.to_string(),
            ..Default::default()
        });

        let mut logs = self.docker.logs(id, options);
        let mut output = String::new();
        while let Some(Ok(chunk)) = logs.next().await {
            output.push_str(&chunk.to_string());
        }
        output.trim().replace('\n', " | ")
    }
}

impl VolumeRuntime for DockerRuntime {
    async fn check_binary(&self) -> Result<String> {
        let output = tokio::process::Command::new("docker")
            .arg("--version")
            .output()
            .await
            .context("Docker is not installed (docker binary not found in PATH)")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("docker --version failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .context("Docker daemon is not reachable. Is Docker running?")?;
        Ok(())
    }

    async fn list_volumes(&self) -> Result<Vec<String>> {
        let response = self
            .docker
            .list_volumes(None::<ListVolumesOptions<String>>)
            .await
            .context("Failed to list Docker volumes")?;

        Ok(response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|volume| volume.name)
            .collect())
    }

    async fn volume_exists(&self, name: &str) -> Result<bool> {
        match self.docker.inspect_volume(name).await {
            Ok(_) => Ok(true),
            Err(DockerError::DockerResponseServerError { status_code: 404, .. }) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to inspect volume {}", name)),
        }
    }

    async fn containers_using_volume(&self, volume: &str) -> Result<Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert("volume".to_string(), vec![volume.to_string()]);

        // Running containers only: stopped ones are left alone
        let options = Some(ListContainersOptions {
            all: false,
            filters,
            ..Default::default()
        });

        let containers = self
            .docker
            .list_containers(options)
            .await
            .with_context(|| format!("Failed to list containers using {}", volume))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                c.names
                    .as_ref()
                    .and_then(|names| names.first())
                    .map(|n| n.trim_start_matches('/').to_string())
            })
            .collect())
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        let result = self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: self.stop_timeout }))
            .await;
        ignore_not_modified(result).with_context(|| format!("docker stop {} failed", name))
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        let result = self
            .docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await;
        ignore_not_modified(result).with_context(|| format!("docker start {} failed", name))
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        let (from_image, tag) = split_image_ref(image);
        let options = Some(CreateImageOptions {
            from_image: from_image.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        });

        let mut pull = self.docker.create_image(options, None, None);
        while let Some(progress) = pull.next().await {
            progress.with_context(|| format!("Failed to pull helper image {}", image))?;
        }
        Ok(())
    }

    async fn archive_volume(&self, request: &ArchiveRequest) -> Result<()> {
        let name = format!("{}-{}-{}", HELPER_NAME_PREFIX, request.volume, std::process::id());

        let config = Config {
            image: Some(request.image.clone()),
            cmd: Some(request.helper_command()),
            network_disabled: Some(true),
            host_config: Some(HostConfig {
                binds: Some(request.binds()),
                network_mode: Some("none".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: None,
                }),
                config,
            )
            .await
            .with_context(|| format!("Failed to create helper container {}", name))?;

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner());
        spinner.set_message(format!("Archiving {}", request.volume));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let result = self.run_helper(&created.id).await;
        spinner.finish_and_clear();

        // The helper is always discarded, whatever happened inside it
        let removed = self
            .docker
            .remove_container(
                &created.id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;

        match (result, removed) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(e).with_context(|| format!("Failed to remove helper container {}", name)),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}

/// Split `repo[:tag]` for a pull. Registry ports are not tags, and digests
/// are passed through whole.
pub fn split_image_ref(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    match image.rfind(':') {
        Some(idx) if !image[idx + 1..].contains('/') => (&image[..idx], &image[idx + 1..]),
        _ => (image, "latest"),
    }
}

/// The daemon answers 304 when a container is already in the requested
/// state (stopped before `stop`, running before `start`); that is success.
fn ignore_not_modified(result: std::result::Result<(), DockerError>) -> std::result::Result<(), DockerError> {
    match result {
        Err(DockerError::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error(status_code: u16) -> DockerError {
        DockerError::DockerResponseServerError {
            status_code,
            message: String::new(),
        }
    }

    #[test]
    fn test_already_stopped_or_started_is_success() {
        assert!(ignore_not_modified(Err(server_error(304))).is_ok());
        assert!(ignore_not_modified(Ok(())).is_ok());
    }

    #[test]
    fn test_other_daemon_errors_are_kept() {
        match ignore_not_modified(Err(server_error(404))) {
            Err(DockerError::DockerResponseServerError { status_code, .. }) => assert_eq!(status_code, 404),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(ignore_not_modified(Err(server_error(500))).is_err());
    }

    #[test]
    fn test_split_image_ref() {
        assert_eq!(split_image_ref("alpine:latest"), ("alpine", "latest"));
        assert_eq!(split_image_ref("alpine"), ("alpine", "latest"));
        assert_eq!(split_image_ref("busybox:1.36"), ("busybox", "1.36"));
        assert_eq!(
            split_image_ref("registry.local:5000/tools/tar"),
            ("registry.local:5000/tools/tar", "latest")
        );
        assert_eq!(
            split_image_ref("registry.local:5000/tools/tar:2"),
            ("registry.local:5000/tools/tar", "2")
        );
        assert_eq!(split_image_ref("alpine@sha256:abcd"), ("alpine@sha256:abcd", ""));
    }

    #[tokio::test]
    async fn test_docker_runtime_ping() {
        // This test requires Docker to be running
        if let Ok(runtime) = DockerRuntime::connect(10) {
            if runtime.ping().await.is_ok() {
                assert!(runtime.list_volumes().await.is_ok());
            }
        }
    }
}
