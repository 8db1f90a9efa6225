// ABOUTME: Container runtime access: capability traits, the bollard adapter and the lazy client.
// ABOUTME: Everything above this layer talks to the engine through these traits.

mod bollard;
mod client;
mod error;
#[cfg(test)]
pub(crate) mod testing;
pub mod traits;

pub use self::bollard::BollardRuntime;
pub use client::RuntimeClient;
pub use error::RuntimeError;
pub use traits::{
    AttachedIo, ContainerDetails, ContainerError, ContainerOps, ContainerSpec, ContainerSummary,
    ExecError, ExecOps, ExecSpec, FullRuntime, HostOptions, ImageError, ImageOps, OutputChunk,
    PortMapping, ProgressEvent, ProgressRecord, ProgressStream, RemoveFlags, StartOptions,
};
