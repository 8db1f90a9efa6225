// ABOUTME: Application-wide error types and the shared failure taxonomy.
// ABOUTME: Every layer's error maps onto ErrorKind so callers can branch on the kind.

use crate::engine::EngineError;
use crate::provider::ProviderError;
use crate::runtime::RuntimeError;
use std::path::PathBuf;
use thiserror::Error;

/// What kind of failure happened, independent of which layer reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An id or name did not resolve.
    NotFound,
    /// A create collided with an existing container.
    AlreadyExists,
    /// Removal of a running container without permission to stop it.
    StillRunning,
    /// Malformed image or container options.
    InvalidSpec,
    /// A bounded operation did not finish in time.
    Timeout,
    /// Retryable shell or network failure.
    Transient,
    /// Missing files or broken configuration; retrying will not help.
    ConfigurationFatal,
    /// A uniqueness or consistency assumption of the tool was violated.
    InternalInvariant,
    /// An underlying runtime call failed.
    Runtime,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::StillRunning => "still running",
            ErrorKind::InvalidSpec => "invalid spec",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transient => "transient",
            ErrorKind::ConfigurationFatal => "configuration",
            ErrorKind::InternalInvariant => "internal invariant",
            ErrorKind::Runtime => "runtime",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not read {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("cannot determine the home directory; set sys_conf_root in kbox.yml")]
    HomeDirUnknown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfig(_)
            | Error::ConfigFile { .. }
            | Error::HomeDirUnknown
            | Error::Io(_)
            | Error::Yaml(_) => ErrorKind::ConfigurationFatal,
            Error::Engine(e) => e.kind(),
            Error::Provider(e) => e.kind(),
            Error::Runtime(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
