// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Ids, image references and the container name codec.

pub mod container_name;
mod id;
mod image_ref;

pub use container_name::{ContainerName, ContainerNameError, Scheme};
pub use id::{ContainerId, ExecId};
pub use image_ref::{ImageDefaults, ImageRef, ParseImageRefError};
