// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Build from an archived context and pull from a registry, both as progress streams.

use super::sealed::Sealed;
use super::shared_types::ProgressEvent;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Progress of a build or pull. The stream may borrow the runtime that
/// produced it.
pub type ProgressStream<'a> =
    Pin<Box<dyn Stream<Item = Result<ProgressEvent, ImageError>> + Send + 'a>>;

/// Image operations: build and pull.
pub trait ImageOps: Sealed + Send + Sync {
    /// Build `tag` from a tar archive whose root holds a `Dockerfile`.
    fn build_image<'a>(&'a self, tag: &str, context: Bytes) -> ProgressStream<'a>;

    /// Pull `reference` from its registry.
    fn pull_image<'a>(&'a self, reference: &str) -> ProgressStream<'a>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
