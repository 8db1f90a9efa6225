// ABOUTME: Runtime client error types with SNAFU pattern.
// ABOUTME: Covers resolving the engine endpoint and connecting to it.

use snafu::Snafu;

use crate::error::ErrorKind;
use crate::provider::ProviderError;

/// Failure to produce a connected runtime client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RuntimeError {
    #[snafu(display("could not resolve the engine endpoint: {source}"))]
    Endpoint { source: ProviderError },

    #[snafu(display("could not connect to the engine at {url}: {source}"))]
    Connect {
        url: String,
        source: bollard::errors::Error,
    },
}

impl RuntimeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Endpoint { source } => source.kind(),
            RuntimeError::Connect { .. } => ErrorKind::Transient,
        }
    }

    /// The engine URL, when the failure happened while connecting.
    pub fn url(&self) -> Option<&str> {
        match self {
            RuntimeError::Connect { url, .. } => Some(url),
            RuntimeError::Endpoint { .. } => None,
        }
    }
}
