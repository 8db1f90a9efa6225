// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: List, create, start, stop, remove, inspect, attach and wait.

use super::sealed::Sealed;
use super::shared_types::{
    AttachedIo, ContainerDetails, ContainerSpec, ContainerSummary, RemoveFlags, StartOptions,
};
use crate::types::ContainerId;
use async_trait::async_trait;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// List containers, including stopped ones when `all` is set.
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, ContainerError>;

    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpec,
    ) -> Result<ContainerId, ContainerError>;

    async fn start_container(
        &self,
        id: &ContainerId,
        opts: &StartOptions,
    ) -> Result<(), ContainerError>;

    async fn stop_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    async fn remove_container(
        &self,
        id: &ContainerId,
        flags: RemoveFlags,
    ) -> Result<(), ContainerError>;

    async fn inspect_container(&self, id: &ContainerId)
    -> Result<ContainerDetails, ContainerError>;

    /// Attach to the container's standard streams. Call before starting it
    /// to see all of its output.
    async fn attach_container(
        &self,
        id: &ContainerId,
    ) -> Result<AttachedIo<ContainerError>, ContainerError>;

    /// Block until the container exits and return its exit code.
    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError>;
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
