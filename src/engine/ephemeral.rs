// ABOUTME: Throwaway containers: temporary names, scoped use and one-shot runs.
// ABOUTME: The created container is force-removed on every exit path.

use super::error::{EngineError, WrapErr};
use super::exec;
use super::ContainerManager;
use crate::runtime::{ContainerSpec, FullRuntime, RemoveFlags, StartOptions};
use crate::types::{ContainerId, ContainerName};
use std::collections::HashSet;
use std::future::Future;
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

const TEMP_NAME_ATTEMPTS: usize = 8;

/// Handle to a container this crate created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedContainer {
    pub id: ContainerId,
    pub name: String,
}

const FORCE: RemoveFlags = RemoveFlags {
    force: true,
    volumes: false,
};

impl<R: FullRuntime> ContainerManager<R> {
    /// A temporary container name not used by any existing container.
    pub async fn create_temp_name(&self) -> Result<ContainerName, EngineError> {
        let taken: HashSet<String> = self
            .list(None)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();

        (0..TEMP_NAME_ATTEMPTS)
            .map(|_| ContainerName::temp())
            .find(|name| !taken.contains(&name.to_string()))
            .ok_or_else(|| {
                EngineError::InternalInvariant(
                    "could not generate an unused temporary container name".to_string(),
                )
            })
    }

    /// Create a temporary container from `image`, start it, hand it to `f`
    /// and force-remove it afterwards whatever happened.
    ///
    /// Without an explicit command the container runs `bash` on a terminal so
    /// it stays up until removed. The error of `f` (or of starting) wins over
    /// a cleanup error.
    pub async fn use_container<T, F, Fut>(
        &self,
        image: &str,
        mut spec: ContainerSpec,
        start: StartOptions,
        f: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce(CreatedContainer) -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        spec.image = self.expand_image(image)?;
        if spec.cmd.is_none() {
            spec.cmd = Some(vec!["bash".to_string()]);
            spec.tty = true;
        }
        let name = self.create_temp_name().await?.to_string();

        info!(image = %spec.image, container = %name, "creating ad hoc container");
        let id = self
            .runtime
            .create_container(&name, &spec)
            .await
            .wrap_err(|| format!("error running ad hoc container with {}", spec.image))?;
        info!(id = %id, "ad hoc container created");

        let created = CreatedContainer {
            id: id.clone(),
            name,
        };
        let outcome = async {
            self.runtime.start_container(&id, &start).await?;
            info!(id = %id, "ad hoc container started");
            f(created).await
        }
        .await
        .wrap_err(|| format!("error running ad hoc container with {}", spec.image));

        info!(id = %id, "removing ad hoc container");
        let cleanup = self.runtime.remove_container(&id, FORCE).await;
        settle(outcome, cleanup, &id)
    }

    /// Run `cmd` in a fresh container attached to local stdout and return its
    /// exit code. The container is force-removed afterwards.
    pub async fn run(
        &self,
        image: &str,
        cmd: Vec<String>,
        spec: ContainerSpec,
        start: StartOptions,
    ) -> Result<i64, EngineError> {
        self.run_to(image, cmd, spec, start, &mut tokio::io::stdout())
            .await
    }

    /// [`run`](Self::run) writing the container's output to `out`.
    pub async fn run_to<W>(
        &self,
        image: &str,
        cmd: Vec<String>,
        mut spec: ContainerSpec,
        start: StartOptions,
        out: &mut W,
    ) -> Result<i64, EngineError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        spec.image = self.expand_image(image)?;
        spec.cmd = Some(cmd);
        spec.attach_stdin = true;
        spec.attach_stdout = true;
        spec.attach_stderr = true;
        spec.tty = true;
        spec.open_stdin = true;
        spec.stdin_once = false;
        let name = self.create_temp_name().await?.to_string();

        debug!(image = %spec.image, container = %name, "creating run container");
        let id = self
            .runtime
            .create_container(&name, &spec)
            .await
            .wrap_err(|| format!("error creating run container from {}", spec.image))?;

        let outcome = async {
            debug!(id = %id, "attaching to run container");
            let mut io = self.runtime.attach_container(&id).await?;
            let stdin = io
                .input
                .take()
                .map(|input| exec::forward_input(tokio::io::stdin(), input));

            debug!(id = %id, "starting run container");
            let piped = async {
                self.runtime.start_container(&id, &start).await?;
                exec::pipe_output(io.output, out).await?;
                debug!(id = %id, "waiting on run container");
                Ok::<_, EngineError>(self.runtime.wait_container(&id).await?)
            }
            .await;

            if let Some(stdin) = stdin {
                stdin.abort();
            }
            piped
        }
        .await
        .wrap_err(|| format!("error running {} in a container", spec.image));

        debug!(id = %id, "removing run container");
        let cleanup = self.runtime.remove_container(&id, FORCE).await;
        settle(outcome, cleanup, &id)
    }
}

/// Combine an operation's outcome with its cleanup; the operation's own
/// failure always takes precedence.
fn settle<T>(
    outcome: Result<T, EngineError>,
    cleanup: Result<(), crate::runtime::ContainerError>,
    id: &ContainerId,
) -> Result<T, EngineError> {
    match (outcome, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e).wrap_err(|| format!("error removing container {id}")),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup)) => {
            warn!(id = %id, error = %cleanup, "cleanup failed after an earlier error");
            Err(e)
        }
    }
}
