// ABOUTME: Library root for kbox - exposes the engine, provider and runtime layers.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod image;
pub mod output;
pub mod provider;
pub mod retry;
pub mod runtime;
pub mod types;
