// ABOUTME: Exec operations trait for container runtimes.
// ABOUTME: Create exec sessions and start them attached.

use super::sealed::Sealed;
use super::shared_types::{AttachedIo, ExecSpec};
use crate::types::{ContainerId, ExecId};
use async_trait::async_trait;

/// Exec operations: run commands in containers.
#[async_trait]
pub trait ExecOps: Sealed + Send + Sync {
    /// Create an exec instance without starting it.
    async fn create_exec(
        &self,
        container: &ContainerId,
        spec: &ExecSpec,
    ) -> Result<ExecId, ExecError>;

    /// Start a created exec instance and attach to its streams.
    async fn start_exec(&self, exec: &ExecId, tty: bool) -> Result<AttachedIo<ExecError>, ExecError>;
}

/// Errors from exec operations.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container not running: {0}")]
    ContainerNotRunning(String),

    #[error("exec instance not found: {0}")]
    ExecNotFound(String),

    #[error("exec failed: {0}")]
    Failed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
