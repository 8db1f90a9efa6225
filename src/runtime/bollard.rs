// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Talks the Docker-compatible engine API of the provider VM or local host.

use crate::provider::EngineEndpoint;
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    AttachedIo, ContainerDetails, ContainerError, ContainerOps, ContainerSpec, ContainerSummary,
    ExecError, ExecOps, ExecSpec, ImageError, ImageOps, OutputChunk, ProgressErrorDetail,
    ProgressEvent, ProgressRecord, ProgressStream, RemoveFlags, StartOptions,
};
use crate::types::{ContainerId, ExecId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    AttachContainerOptions, BuildImageOptions, CreateContainerOptions, CreateImageOptions,
    InspectContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{Either, Full};
use std::collections::{BTreeMap, HashMap};

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::ImageNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ContainerError::AlreadyExists(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 400 => ContainerError::InvalidConfig(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_exec_create_error(e: bollard::errors::Error) -> ExecError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ExecError::ContainerNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ExecError::ContainerNotRunning(message.clone()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

fn map_exec_not_found_error(e: bollard::errors::Error) -> ExecError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ExecError::ExecNotFound(message.clone()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

fn output_chunk(output: LogOutput) -> OutputChunk {
    match output {
        LogOutput::StdOut { message } | LogOutput::StdIn { message } => {
            OutputChunk::Stdout(message)
        }
        LogOutput::StdErr { message } => OutputChunk::Stderr(message),
        LogOutput::Console { message } => OutputChunk::Console(message),
    }
}

/// Undecodable chunks in a progress stream become plain lines rather than failures.
fn progress_item(
    item: Result<ProgressRecord, bollard::errors::Error>,
    fail: fn(String) -> ImageError,
) -> Result<ProgressEvent, ImageError> {
    match item {
        Ok(record) => Ok(ProgressEvent::Record(record)),
        Err(bollard::errors::Error::JsonDataError { message, .. }) => {
            Ok(ProgressEvent::Line(message))
        }
        Err(e) => Err(fail(e.to_string())),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
pub struct BollardRuntime {
    client: Docker,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker) -> Self {
        Self { client }
    }

    /// Connect to the engine at `endpoint` over plain HTTP.
    pub fn connect(endpoint: &EngineEndpoint) -> Result<Self, bollard::errors::Error> {
        let client = Docker::connect_with_http(&endpoint.url(), 120, bollard::API_DEFAULT_VERSION)?;
        Ok(Self::new(client))
    }

    /// Connect to the engine of the local host (socket or `DOCKER_HOST`).
    pub fn connect_local() -> Result<Self, bollard::errors::Error> {
        Ok(Self::new(Docker::connect_with_local_defaults()?))
    }
}

impl Sealed for BollardRuntime {}

fn create_body(spec: &ContainerSpec) -> ContainerCreateBody {
    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    let mut exposed_ports: Vec<String> = Vec::new();
    for port in &spec.host.ports {
        exposed_ports.push(port.container_port.clone());
        port_bindings.insert(
            port.container_port.clone(),
            Some(vec![PortBinding {
                host_ip: port.host_ip.clone(),
                host_port: port.host_port.map(|p| p.to_string()),
            }]),
        );
    }

    let host_config = HostConfig {
        binds: (!spec.host.binds.is_empty()).then(|| spec.host.binds.clone()),
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        privileged: spec.host.privileged.then_some(true),
        network_mode: spec.host.network_mode.clone(),
        volumes_from: (!spec.host.volumes_from.is_empty()).then(|| spec.host.volumes_from.clone()),
        ..Default::default()
    };

    ContainerCreateBody {
        image: Some(spec.image.clone()),
        cmd: spec.cmd.clone(),
        entrypoint: spec.entrypoint.clone(),
        env: (!spec.env.is_empty()).then(|| spec.env.clone()),
        working_dir: spec.working_dir.clone(),
        user: spec.user.clone(),
        labels: (!spec.labels.is_empty()).then(|| spec.labels.clone()),
        tty: Some(spec.tty),
        open_stdin: Some(spec.open_stdin),
        stdin_once: Some(spec.stdin_once),
        attach_stdin: Some(spec.attach_stdin),
        attach_stdout: Some(spec.attach_stdout),
        attach_stderr: Some(spec.attach_stderr),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        host_config: Some(host_config),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, ContainerError> {
        let opts = ListContainersOptions {
            all,
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: ContainerId::new(c.id.unwrap_or_default()),
                names: c.names.unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                state: c
                    .state
                    .map(|s| format!("{:?}", s).to_lowercase())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpec,
    ) -> Result<ContainerId, ContainerError> {
        let opts = CreateContainerOptions {
            name: Some(name.to_string()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), create_body(spec))
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(
        &self,
        id: &ContainerId,
        opts: &StartOptions,
    ) -> Result<(), ContainerError> {
        let opts = StartContainerOptions {
            detach_keys: opts.detach_keys.clone(),
        };

        self.client
            .start_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn stop_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .stop_container(id.as_str(), None::<StopContainerOptions>)
            .await
            .map_err(map_container_not_found_error)
    }

    async fn remove_container(
        &self,
        id: &ContainerId,
        flags: RemoveFlags,
    ) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force: flags.force,
            v: flags.volumes,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn inspect_container(
        &self,
        id: &ContainerId,
    ) -> Result<ContainerDetails, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let raw = serde_json::to_value(&details)
            .map_err(|e| ContainerError::Runtime(format!("unserializable inspect data: {e}")))?;

        let mut ports = BTreeMap::new();
        if let Some(map) = details.network_settings.as_ref().and_then(|n| n.ports.as_ref()) {
            for (container_port, bindings) in map {
                let host_port = bindings
                    .as_ref()
                    .and_then(|b| b.first())
                    .and_then(|b| b.host_port.clone());
                ports.insert(container_port.clone(), host_port);
            }
        }

        Ok(ContainerDetails {
            id: ContainerId::new(details.id.clone().unwrap_or_else(|| id.to_string())),
            name: details
                .name
                .clone()
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            running: details
                .state
                .as_ref()
                .and_then(|s| s.running)
                .unwrap_or(false),
            ports,
            raw,
        })
    }

    async fn attach_container(
        &self,
        id: &ContainerId,
    ) -> Result<AttachedIo<ContainerError>, ContainerError> {
        let opts = AttachContainerOptions {
            stdin: true,
            stdout: true,
            stderr: true,
            stream: true,
            ..Default::default()
        };

        let attached = self
            .client
            .attach_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)?;

        let output = attached.output.map(|item| {
            item.map(output_chunk)
                .map_err(|e| ContainerError::Runtime(e.to_string()))
        });

        Ok(AttachedIo {
            output: Box::pin(output),
            input: Some(attached.input),
        })
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let opts = WaitContainerOptions {
            condition: "not-running".to_string(),
        };

        let mut stream = self.client.wait_container(id.as_str(), Some(opts));
        let mut code = 0;
        while let Some(item) = stream.next().await {
            match item {
                Ok(response) => code = response.status_code,
                // Non-zero exits surface as this error variant.
                Err(bollard::errors::Error::DockerContainerWaitError { code: exit, .. }) => {
                    return Ok(exit);
                }
                Err(e) => return Err(map_container_not_found_error(e)),
            }
        }
        Ok(code)
    }
}

#[async_trait]
impl ExecOps for BollardRuntime {
    async fn create_exec(
        &self,
        container: &ContainerId,
        spec: &ExecSpec,
    ) -> Result<ExecId, ExecError> {
        let opts = bollard::models::ExecConfig {
            cmd: Some(spec.cmd.iter().cloned().collect()),
            env: (!spec.env.is_empty()).then(|| spec.env.clone()),
            working_dir: spec.working_dir.clone(),
            user: spec.user.clone(),
            attach_stdin: Some(spec.attach_stdin),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(spec.tty),
            ..Default::default()
        };

        let response = self
            .client
            .create_exec(container.as_str(), opts)
            .await
            .map_err(map_exec_create_error)?;

        Ok(ExecId::new(response.id))
    }

    async fn start_exec(&self, exec: &ExecId, tty: bool) -> Result<AttachedIo<ExecError>, ExecError> {
        let opts = StartExecOptions {
            detach: false,
            tty,
            ..Default::default()
        };

        let result = self
            .client
            .start_exec(exec.as_str(), Some(opts))
            .await
            .map_err(map_exec_not_found_error)?;

        match result {
            StartExecResults::Attached { output, input } => {
                let output = output.map(|item| {
                    item.map(output_chunk)
                        .map_err(|e| ExecError::Failed(e.to_string()))
                });
                Ok(AttachedIo {
                    output: Box::pin(output),
                    input: Some(input),
                })
            }
            StartExecResults::Detached => Err(ExecError::Failed(format!(
                "exec {} started detached",
                exec
            ))),
        }
    }
}

impl ImageOps for BollardRuntime {
    fn build_image<'a>(&'a self, tag: &str, context: Bytes) -> ProgressStream<'a> {
        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: Some(tag.to_string()),
            rm: true,
            ..Default::default()
        };
        let body = Either::Left(Full::new(context));

        let stream = self.client.build_image(options, None, Some(body)).map(|item| {
            let item = item.map(|info| ProgressRecord {
                stream: info.stream,
                status: info.status,
                error: None,
                error_detail: info
                    .error_detail
                    .map(|d| ProgressErrorDetail { message: d.message }),
            });
            progress_item(item, ImageError::BuildFailed)
        });
        Box::pin(stream)
    }

    fn pull_image<'a>(&'a self, reference: &str) -> ProgressStream<'a> {
        let options = CreateImageOptions {
            from_image: Some(reference.to_string()),
            ..Default::default()
        };

        let stream = self
            .client
            .create_image(Some(options), None, None)
            .map(|item| {
                let item = item.map(|info| ProgressRecord {
                    stream: None,
                    status: info.status,
                    error: None,
                    error_detail: info
                        .error_detail
                        .map(|d| ProgressErrorDetail { message: d.message }),
                });
                progress_item(item, ImageError::PullFailed)
            });
        Box::pin(stream)
    }
}
