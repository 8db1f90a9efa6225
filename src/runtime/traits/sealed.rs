// ABOUTME: Sealed supertrait for the runtime capability traits.
// ABOUTME: Only runtimes defined in this crate can implement ContainerOps, ExecOps or ImageOps.

/// Implemented by the crate's own runtimes (and its test fake) only.
pub trait Sealed {}
