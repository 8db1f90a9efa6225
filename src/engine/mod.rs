// ABOUTME: Container lifecycle manager over the runtime capability traits.
// ABOUTME: Decodes container names into generic containers and keeps start/stop/remove idempotent.

mod ephemeral;
mod error;
mod exec;

pub use ephemeral::CreatedContainer;
pub use error::{EngineError, WrapErr};
pub use exec::{BatchExec, Completion, ExecOptions, ExecSession, InteractiveExec};

use crate::runtime::{ContainerDetails, ContainerSpec, ContainerSummary, ExecSpec, FullRuntime};
use crate::runtime::{RemoveFlags, StartOptions};
use crate::types::container_name::strip_decoration;
use crate::types::{ContainerId, ContainerName, ImageDefaults, ImageRef};
use nonempty::NonEmpty;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Tunables for the container manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Bound on the container listing query.
    pub list_timeout: Duration,
    pub images: ImageDefaults,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            list_timeout: Duration::from_secs(30),
            images: ImageDefaults::default(),
        }
    }
}

/// This tool's view of a runtime container, derived from its decoded name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenericContainer {
    pub id: ContainerId,
    /// The full encoded name, e.g. `kb_myapp_web`.
    pub name: String,
    pub app: Option<String>,
    #[serde(skip)]
    decoded: ContainerName,
}

impl GenericContainer {
    /// `None` for containers whose name does not follow the naming scheme.
    fn from_summary(summary: &ContainerSummary) -> Option<Self> {
        let raw = strip_decoration(summary.names.first()?);
        let decoded = ContainerName::parse(raw)?;
        Some(Self {
            id: summary.id.clone(),
            name: raw.to_string(),
            app: decoded.app_name().map(str::to_string),
            decoded,
        })
    }

    pub fn decoded(&self) -> &ContainerName {
        &self.decoded
    }

    pub fn simple_name(&self) -> &str {
        self.decoded.simple_name()
    }

    fn matches(&self, cid: &str) -> bool {
        self.id.as_str() == cid || self.name == cid
    }
}

/// A generic container merged with live inspect data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    #[serde(flatten)]
    pub container: GenericContainer,
    /// `containerPort=>hostPort`, with `ERROR` for an unbound host port.
    pub ports: Vec<String>,
    pub running: bool,
}

/// Options for [`ContainerManager::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Stop a running container first instead of failing.
    pub kill: bool,
    /// Remove the container's anonymous volumes.
    pub volumes: bool,
}

impl Default for RemoveOptions {
    fn default() -> Self {
        Self {
            kill: false,
            volumes: true,
        }
    }
}

/// Container lifecycle operations on top of a runtime.
pub struct ContainerManager<R> {
    runtime: Arc<R>,
    settings: ManagerSettings,
}

impl<R: FullRuntime> ContainerManager<R> {
    pub fn new(runtime: Arc<R>, settings: ManagerSettings) -> Self {
        Self { runtime, settings }
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Expand an image name against the configured namespace and tag.
    pub fn expand_image(&self, raw: &str) -> Result<String, EngineError> {
        let image = ImageRef::parse(raw)
            .map_err(|e| EngineError::InvalidSpec(format!("image {raw:?}: {e}")))?;
        Ok(image.expand(&self.settings.images).to_string())
    }

    /// All containers following the naming scheme, optionally only one app's.
    pub async fn list(&self, app: Option<&str>) -> Result<Vec<GenericContainer>, EngineError> {
        let after = self.settings.list_timeout;
        let summaries = tokio::time::timeout(after, self.runtime.list_containers(true))
            .await
            .map_err(|_| EngineError::Timeout {
                operation: "listing containers",
                after,
            })?
            .wrap_err(|| "error querying the runtime for the list of containers")?;

        Ok(summaries
            .iter()
            .filter_map(GenericContainer::from_summary)
            .filter(|c| app.is_none_or(|a| c.app.as_deref() == Some(a)))
            .collect())
    }

    /// Find a container by id or encoded name.
    pub async fn find(&self, cid: &str) -> Result<Option<GenericContainer>, EngineError> {
        let mut matches: Vec<GenericContainer> = self
            .list(None)
            .await?
            .into_iter()
            .filter(|c| c.matches(cid))
            .collect();

        if matches.len() > 1 {
            return Err(EngineError::InternalInvariant(format!(
                "{} containers match {cid}",
                matches.len()
            )));
        }
        Ok(matches.pop())
    }

    pub async fn find_or_fail(&self, cid: &str) -> Result<GenericContainer, EngineError> {
        self.find(cid)
            .await?
            .ok_or_else(|| EngineError::NotFound(cid.to_string()))
    }

    pub async fn exists(&self, cid: &str) -> Result<bool, EngineError> {
        Ok(self.find(cid).await?.is_some())
    }

    /// Resolve `cid` to the runtime's id.
    pub async fn get(&self, cid: &str) -> Result<Option<ContainerId>, EngineError> {
        Ok(self.find(cid).await?.map(|c| c.id))
    }

    pub async fn get_ensure(&self, cid: &str) -> Result<ContainerId, EngineError> {
        Ok(self.find_or_fail(cid).await?.id)
    }

    pub async fn is_running(&self, cid: &str) -> Result<bool, EngineError> {
        let container = self.find_or_fail(cid).await?;
        self.running(&container.id)
            .await
            .wrap_err(|| format!("error querying whether {cid} is running"))
    }

    async fn running(&self, id: &ContainerId) -> Result<bool, EngineError> {
        Ok(self.runtime.inspect_container(id).await?.running)
    }

    /// Create a container, failing if one with the same name exists.
    pub async fn create(
        &self,
        name: &ContainerName,
        mut spec: ContainerSpec,
    ) -> Result<CreatedContainer, EngineError> {
        let name = name.to_string();
        spec.image = self.expand_image(&spec.image)?;

        let created = async {
            if self.exists(&name).await? {
                return Err(EngineError::AlreadyExists(name.clone()));
            }
            info!(container = %name, image = %spec.image, "creating container");
            let id = self.runtime.create_container(&name, &spec).await?;
            Ok::<_, EngineError>(CreatedContainer {
                id,
                name: name.clone(),
            })
        }
        .await
        .wrap_err(|| format!("creating container {name} failed"))?;

        info!(container = %created.name, id = %created.id, "container created");
        Ok(created)
    }

    /// Start a container; a no-op when it is already running.
    pub async fn start(&self, cid: &str, opts: &StartOptions) -> Result<(), EngineError> {
        info!(container = cid, "starting container");
        async {
            let container = self.find_or_fail(cid).await?;
            if self.running(&container.id).await? {
                info!(container = cid, "container already started");
                return Ok(());
            }
            self.runtime.start_container(&container.id, opts).await?;
            info!(container = cid, "container started");
            Ok::<_, EngineError>(())
        }
        .await
        .wrap_err(|| format!("error starting container {cid}"))
    }

    /// Stop a container; a no-op when it is not running.
    pub async fn stop(&self, cid: &str) -> Result<(), EngineError> {
        info!(container = cid, "stopping container");
        async {
            let container = self.find_or_fail(cid).await?;
            if !self.running(&container.id).await? {
                info!(container = cid, "container already stopped");
                return Ok(());
            }
            self.runtime.stop_container(&container.id).await?;
            info!(container = cid, "container stopped");
            Ok::<_, EngineError>(())
        }
        .await
        .wrap_err(|| format!("error stopping container {cid}"))
    }

    /// Remove a container. A running container is only stopped first when
    /// `opts.kill` is set.
    pub async fn remove(&self, cid: &str, opts: RemoveOptions) -> Result<(), EngineError> {
        info!(container = cid, kill = opts.kill, volumes = opts.volumes, "removing container");
        async {
            let container = self.find_or_fail(cid).await?;
            if self.running(&container.id).await? {
                if !opts.kill {
                    return Err(EngineError::StillRunning(cid.to_string()));
                }
                info!(container = cid, "stopping container before removal");
                self.runtime.stop_container(&container.id).await?;
            }
            let flags = RemoveFlags {
                force: false,
                volumes: opts.volumes,
            };
            self.runtime.remove_container(&container.id, flags).await?;
            info!(container = cid, "container removed");
            Ok::<_, EngineError>(())
        }
        .await
        .wrap_err(|| format!("error removing container {cid}"))
    }

    /// The runtime's inspect data. Fails if the container does not exist.
    pub async fn inspect(&self, cid: &str) -> Result<ContainerDetails, EngineError> {
        async {
            let container = self.find_or_fail(cid).await?;
            Ok::<_, EngineError>(self.runtime.inspect_container(&container.id).await?)
        }
        .await
        .wrap_err(|| format!("error inspecting container {cid}"))
    }

    /// Identity plus ports and running state; `None` when not found.
    pub async fn info(&self, cid: &str) -> Result<Option<ContainerInfo>, EngineError> {
        let Some(container) = self.find(cid).await? else {
            return Ok(None);
        };

        let details = self
            .runtime
            .inspect_container(&container.id)
            .await
            .wrap_err(|| format!("error inspecting container {cid}"))?;

        let ports = details
            .ports
            .iter()
            .map(|(port, host)| format!("{}=>{}", port, host.as_deref().unwrap_or("ERROR")))
            .collect();

        Ok(Some(ContainerInfo {
            container,
            ports,
            running: details.running,
        }))
    }

    /// Create and start an exec session in a container.
    pub async fn exec(&self, cid: &str, opts: ExecOptions) -> Result<ExecSession, EngineError> {
        let cmd: Vec<String> = opts.cmd.iter().cloned().collect();
        async {
            let container = self.find_or_fail(cid).await?;
            let spec = ExecSpec::new(opts.cmd.clone(), opts.tty);
            debug!(container = cid, ?cmd, tty = opts.tty, "creating exec");
            let exec_id = self.runtime.create_exec(&container.id, &spec).await?;
            debug!(exec = %exec_id, "starting exec");
            let mut io = self.runtime.start_exec(&exec_id, opts.tty).await?;

            if opts.tty {
                let stdin = io
                    .input
                    .take()
                    .map(|input| exec::forward_input(tokio::io::stdin(), input));
                Ok::<_, EngineError>(ExecSession::Interactive(exec::interactive(io, stdin)))
            } else {
                Ok(ExecSession::Batch(exec::batch(io)))
            }
        }
        .await
        .wrap_err(|| format!("error while running command {cmd:?} in container {cid}"))
    }

    /// Run `cmd` without a terminal and hand back the running session.
    pub async fn query(&self, cid: &str, cmd: NonEmpty<String>) -> Result<BatchExec, EngineError> {
        match self.exec(cid, ExecOptions::batch(cmd)).await? {
            ExecSession::Batch(session) => Ok(session),
            ExecSession::Interactive(_) => Err(EngineError::InternalInvariant(
                "batch exec produced an interactive session".to_string(),
            )),
        }
    }

    /// Run `cmd`, wait for it and return its stdout.
    pub async fn query_data(&self, cid: &str, cmd: NonEmpty<String>) -> Result<String, EngineError> {
        self.query(cid, cmd).await?.collect_stdout().await
    }

    /// Open an interactive shell, piping its output to local stdout.
    pub async fn terminal(&self, cid: &str) -> Result<(), EngineError> {
        let opts = ExecOptions::interactive(NonEmpty::new("/bin/bash".to_string()));
        match self.exec(cid, opts).await? {
            ExecSession::Interactive(session) => {
                exec::drain_interactive(session, &mut tokio::io::stdout()).await
            }
            ExecSession::Batch(_) => Err(EngineError::InternalInvariant(
                "terminal exec produced a batch session".to_string(),
            )),
        }
    }
}
