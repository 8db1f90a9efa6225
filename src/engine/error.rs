// ABOUTME: Error type of the container and image layers.
// ABOUTME: Carries the failure taxonomy plus a context wrapper naming what was attempted.

use crate::error::ErrorKind;
use crate::runtime::{ContainerError, ExecError, ImageError, RuntimeError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("the container {0} does not exist")]
    NotFound(String),

    #[error("the container {0} already exists")]
    AlreadyExists(String),

    #[error("the container {0} is still running; stop it first or remove with kill")]
    StillRunning(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("configuration error: {0}")]
    ConfigurationFatal(String),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// The command wrote to stderr during a batch exec.
    #[error("command wrote to stderr: {0}")]
    Stderr(String),

    #[error("error while acquiring image {image}: {message}")]
    Progress { image: String, message: String },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Client(#[from] RuntimeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            EngineError::StillRunning(_) => ErrorKind::StillRunning,
            EngineError::Timeout { .. } => ErrorKind::Timeout,
            EngineError::InvalidSpec(_) => ErrorKind::InvalidSpec,
            EngineError::ConfigurationFatal(_) => ErrorKind::ConfigurationFatal,
            EngineError::InternalInvariant(_) => ErrorKind::InternalInvariant,
            EngineError::Stderr(_) | EngineError::Progress { .. } | EngineError::Io(_) => {
                ErrorKind::Runtime
            }
            EngineError::Container(e) => match e {
                ContainerError::NotFound(_) | ContainerError::ImageNotFound(_) => {
                    ErrorKind::NotFound
                }
                ContainerError::AlreadyExists(_) => ErrorKind::AlreadyExists,
                ContainerError::InvalidConfig(_) => ErrorKind::InvalidSpec,
                ContainerError::Runtime(_) => ErrorKind::Runtime,
            },
            EngineError::Exec(e) => match e {
                ExecError::ContainerNotFound(_) | ExecError::ExecNotFound(_) => {
                    ErrorKind::NotFound
                }
                _ => ErrorKind::Runtime,
            },
            EngineError::Image(e) => match e {
                ImageError::NotFound(_) => ErrorKind::NotFound,
                _ => ErrorKind::Runtime,
            },
            EngineError::Client(e) => e.kind(),
            EngineError::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, skipping context wrappers.
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach "what was being attempted" to a failure.
pub trait WrapErr<T> {
    fn wrap_err<C, F>(self, context: F) -> Result<T, EngineError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> WrapErr<T> for Result<T, E>
where
    E: Into<EngineError>,
{
    fn wrap_err<C, F>(self, context: F) -> Result<T, EngineError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| EngineError::Context {
            context: context().into(),
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_the_inner_kind() {
        let result: Result<(), EngineError> = Err(EngineError::NotFound("web".into()));
        let err = result.wrap_err(|| "error starting container web").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(err.root(), EngineError::NotFound(_)));
        assert_eq!(
            err.to_string(),
            "error starting container web: the container web does not exist"
        );
    }

    #[test]
    fn runtime_conflicts_map_to_taxonomy() {
        let err = EngineError::from(ContainerError::AlreadyExists("kb_app_web".into()));
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn timeout_message_is_human_readable() {
        let err = EngineError::Timeout {
            operation: "listing containers",
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "listing containers timed out after 30s");
    }
}
