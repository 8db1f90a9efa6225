// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerSpec, ContainerDetails, ExecSpec, output chunks and progress events.

use crate::types::ContainerId;
use bytes::Bytes;
use futures::Stream;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use tokio::io::AsyncWrite;

/// Configuration for creating a container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    /// Image to run. Expanded to its full name before it reaches the runtime.
    pub image: String,
    pub cmd: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    /// `KEY=value` pairs.
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub labels: HashMap<String, String>,
    pub tty: bool,
    pub open_stdin: bool,
    pub stdin_once: bool,
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub host: HostOptions,
}

/// Host-level settings of a container.
#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    /// `host:container[:mode]` bind mounts.
    pub binds: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub privileged: bool,
    pub network_mode: Option<String>,
    pub volumes_from: Vec<String>,
}

/// Port mapping configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    /// Container side, e.g. `80/tcp`.
    pub container_port: String,
    pub host_ip: Option<String>,
    /// `None` lets the runtime pick a free port.
    pub host_port: Option<u16>,
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: ContainerId,
    /// Raw runtime names, still carrying the leading `/`.
    pub names: Vec<String>,
    pub image: String,
    /// Lower-case runtime state (`running`, `exited`...).
    pub state: String,
}

/// Flags for removing a container at the runtime level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveFlags {
    pub force: bool,
    pub volumes: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Key sequence that detaches an attached client.
    pub detach_keys: Option<String>,
}

/// Inspect data this crate relies on, plus the full native payload.
#[derive(Debug, Clone)]
pub struct ContainerDetails {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub running: bool,
    /// Container port -> bound host port, `None` when not bound.
    pub ports: BTreeMap<String, Option<String>>,
    pub raw: serde_json::Value,
}

/// Exec configuration for running commands in containers.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    pub cmd: NonEmpty<String>,
    pub tty: bool,
    pub attach_stdin: bool,
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
}

impl ExecSpec {
    pub fn new(cmd: NonEmpty<String>, tty: bool) -> Self {
        Self {
            cmd,
            tty,
            attach_stdin: tty,
            env: Vec::new(),
            working_dir: None,
            user: None,
        }
    }
}

/// One frame of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    Stdout(Bytes),
    Stderr(Bytes),
    /// Combined output of a session with a pseudo-terminal.
    Console(Bytes),
}

impl OutputChunk {
    pub fn bytes(&self) -> &Bytes {
        match self {
            OutputChunk::Stdout(b) | OutputChunk::Stderr(b) | OutputChunk::Console(b) => b,
        }
    }
}

pub type OutputStream<E> = Pin<Box<dyn Stream<Item = Result<OutputChunk, E>> + Send>>;
pub type InputSink = Pin<Box<dyn AsyncWrite + Send>>;

/// Streams of an attached container or exec session.
pub struct AttachedIo<E> {
    pub output: OutputStream<E>,
    pub input: Option<InputSink>,
}

/// A structured build or pull progress record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProgressRecord {
    pub stream: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
    #[serde(rename = "errorDetail")]
    pub error_detail: Option<ProgressErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProgressErrorDetail {
    pub message: Option<String>,
}

impl ProgressRecord {
    /// The embedded error message, if the record carries one.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.error_detail.as_ref()?.message.as_deref())
    }
}

/// One item of a build/pull progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Record(ProgressRecord),
    /// A chunk that could not be parsed as a record.
    Line(String),
}

impl ProgressEvent {
    pub fn parse(chunk: &[u8]) -> Self {
        match serde_json::from_slice::<ProgressRecord>(chunk) {
            Ok(record) => ProgressEvent::Record(record),
            Err(_) => ProgressEvent::Line(String::from_utf8_lossy(chunk).trim_end().to_string()),
        }
    }
}
