// ABOUTME: Composable capability traits for the container runtime.
// ABOUTME: Defines ContainerOps, ExecOps, ImageOps and the FullRuntime bundle.

mod container;
mod exec;
mod image;
pub(crate) mod sealed;
mod shared_types;

pub use container::{ContainerError, ContainerOps};
pub use exec::{ExecError, ExecOps};
pub use image::{ImageError, ImageOps, ProgressStream};
pub use shared_types::*;

/// Everything the engine layer needs from a runtime.
pub trait FullRuntime: ContainerOps + ExecOps + ImageOps {}

impl<T: ContainerOps + ExecOps + ImageOps> FullRuntime for T {}
