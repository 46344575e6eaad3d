//! Launch strategy backed by the Docker Engine API.
//!
//! Uses `bollard` over the local daemon socket. The engine's public
//! surface is blocking, so the async client runs on a private
//! current-thread runtime driven to completion per call.

use std::collections::HashMap;
use std::time::Duration;

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::models::HostConfig;
use futures::StreamExt;
use tokio::runtime::Runtime;

use egresswatch_common::error::{EgressWatchError, Result};

use super::{LaunchOutcome, LaunchRequest, SandboxBackend};
use crate::hardening;

/// How long the startup probe waits for the daemon to answer a ping.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend that talks to the Docker daemon over its Engine API.
pub struct ApiBackend {
    docker: Docker,
    runtime: Runtime,
}

impl ApiBackend {
    /// Probes the local daemon; returns the backend only when the daemon
    /// answers a ping within [`PROBE_TIMEOUT`].
    #[must_use]
    pub fn probe() -> Option<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .ok()?;
        let docker = Docker::connect_with_local_defaults().ok()?;
        let ping = runtime.block_on(async {
            tokio::time::timeout(PROBE_TIMEOUT, docker.ping()).await
        });
        match ping {
            Ok(Ok(_)) => Some(Self { docker, runtime }),
            _ => None,
        }
    }

    async fn wait_for_exit(&self, id: &str) -> Result<i64> {
        let mut wait = Box::pin(
            self.docker
                .wait_container(id, None::<WaitContainerOptions<String>>),
        );
        let mut exit_code = 0i64;
        while let Some(item) = wait.next().await {
            match item {
                Ok(response) => exit_code = response.status_code,
                // A non-zero exit surfaces as this error variant; it is
                // still a completed wait, not a launch failure.
                Err(bollard::errors::Error::DockerContainerWaitError { code, .. }) => {
                    exit_code = code;
                }
                Err(error) => {
                    return Err(EgressWatchError::Sandbox {
                        message: format!("container wait failed: {error}"),
                    });
                }
            }
        }
        Ok(exit_code)
    }

    async fn collect_log(&self, id: &str) -> String {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut logs = Box::pin(self.docker.logs(id, Some(options)));
        let mut buf = Vec::new();
        while let Some(item) = logs.next().await {
            match item {
                Ok(chunk) => buf.extend_from_slice(&chunk.into_bytes()),
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    async fn launch_inner(&self, request: &LaunchRequest) -> Result<LaunchOutcome> {
        let created = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, container_config(request))
            .await
            .map_err(|e| EgressWatchError::Sandbox {
                message: format!("container create failed: {e}"),
            })?;
        let id = created.id;
        tracing::info!(container = %id, image = %request.image, "container created");

        self.docker
            .start_container(&id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| EgressWatchError::Sandbox {
                message: format!("container start failed: {e}"),
            })?;

        let (exit_code, timed_out) = match request.wait_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.wait_for_exit(&id)).await {
                Ok(code) => (code?, false),
                Err(_) => {
                    tracing::warn!(container = %id, ?limit, "wait deadline expired, killing container");
                    let _ = self
                        .docker
                        .kill_container(&id, None::<KillContainerOptions<String>>)
                        .await;
                    // The kill lands quickly; this second wait drains the
                    // real exit status so artifacts can be salvaged.
                    (self.wait_for_exit(&id).await.unwrap_or(137), true)
                }
            },
            None => (self.wait_for_exit(&id).await?, false),
        };
        tracing::info!(container = %id, exit_code, "container exited");

        let log = self.collect_log(&id).await;

        // Remove only after status and log retrieval.
        if let Err(error) = self
            .docker
            .remove_container(&id, None::<RemoveContainerOptions>)
            .await
        {
            tracing::warn!(container = %id, %error, "container removal failed");
        }

        Ok(LaunchOutcome {
            exit_code,
            log,
            timed_out,
        })
    }
}

impl SandboxBackend for ApiBackend {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchOutcome> {
        self.runtime.block_on(self.launch_inner(request))
    }

    fn name(&self) -> &'static str {
        "docker-api"
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Builds the container configuration from the hardened profile.
///
/// Exposed so the backend contract tests can compare it against the
/// subprocess strategy without a running daemon.
#[must_use]
pub fn container_config(request: &LaunchRequest) -> Config<String> {
    let tmpfs: HashMap<String, String> = hardening::TMPFS_MOUNTS
        .iter()
        .map(|(path, opts)| ((*path).to_string(), (*opts).to_string()))
        .collect();
    let host_config = HostConfig {
        binds: Some(hardening::bind_mounts(&request.work_dir, &request.output_dir)),
        cap_drop: Some(vec![hardening::DROPPED_CAPABILITIES.to_string()]),
        cap_add: Some(vec![hardening::RETAINED_CAPABILITY.to_string()]),
        security_opt: Some(
            hardening::SECURITY_OPTS
                .iter()
                .map(|opt| (*opt).to_string())
                .collect(),
        ),
        readonly_rootfs: Some(true),
        tmpfs: Some(tmpfs),
        ..Default::default()
    };
    Config {
        image: Some(request.image.clone()),
        cmd: Some(request.container_command.clone()),
        working_dir: Some(egresswatch_common::constants::CONTAINER_WORK_DIR.to_string()),
        host_config: Some(host_config),
        ..Default::default()
    }
}
