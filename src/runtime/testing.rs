// ABOUTME: In-memory runtime used by unit tests of the engine and image layers.
// ABOUTME: Records every underlying call so tests can assert on what was (not) issued.

use super::traits::sealed::Sealed;
use super::traits::{
    AttachedIo, ContainerDetails, ContainerError, ContainerOps, ContainerSpec, ContainerSummary,
    ExecError, ExecOps, ExecSpec, ImageError, ImageOps, OutputChunk, ProgressEvent,
    ProgressStream, RemoveFlags, StartOptions,
};
use crate::types::{ContainerId, ExecId};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    List,
    Create(String),
    Start(String),
    Stop(String),
    Remove { id: String, force: bool, volumes: bool },
    Inspect(String),
    Attach(String),
    Wait(String),
    CreateExec { container: String, cmd: Vec<String> },
    StartExec(String),
    Build { tag: String, context_len: usize },
    Pull(String),
}

/// Container operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Op {
    Start,
    Remove,
    Attach,
    Wait,
}

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    name: String,
    image: String,
    running: bool,
    ports: BTreeMap<String, Option<String>>,
}

#[derive(Default)]
struct State {
    containers: Vec<FakeContainer>,
    calls: Vec<Call>,
    list_delay: Option<Duration>,
    output: Vec<OutputChunk>,
    progress: Vec<ProgressEvent>,
    progress_failure: Option<String>,
    failures: BTreeMap<Op, String>,
    exit_code: i64,
    next_id: u32,
}

#[derive(Default)]
pub(crate) struct FakeRuntime {
    state: Mutex<State>,
}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a container under its raw runtime name and return its id.
    pub(crate) fn add_container(&self, name: &str, running: bool) -> ContainerId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("c{:04}", state.next_id);
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: format!("/{name}"),
            image: "kalabox/debian:stable".to_string(),
            running,
            ports: BTreeMap::new(),
        });
        ContainerId::new(id)
    }

    pub(crate) fn set_ports(&self, id: &ContainerId, ports: &[(&str, Option<&str>)]) {
        let mut state = self.state.lock();
        if let Some(c) = state.containers.iter_mut().find(|c| c.id == id.as_str()) {
            c.ports = ports
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect();
        }
    }

    pub(crate) fn set_list_delay(&self, delay: Duration) {
        self.state.lock().list_delay = Some(delay);
    }

    /// Chunks returned by every attach or exec session.
    pub(crate) fn set_output(&self, output: Vec<OutputChunk>) {
        self.state.lock().output = output;
    }

    pub(crate) fn set_exit_code(&self, code: i64) {
        self.state.lock().exit_code = code;
    }

    pub(crate) fn set_progress(&self, progress: Vec<ProgressEvent>) {
        self.state.lock().progress = progress;
    }

    /// Make build and pull streams end with a transport error.
    pub(crate) fn fail_progress(&self, message: &str) {
        self.state.lock().progress_failure = Some(message.to_string());
    }

    /// Make every later `op` fail with a runtime error carrying `message`.
    /// The call is still recorded.
    pub(crate) fn fail(&self, op: Op, message: &str) {
        self.state.lock().failures.insert(op, message.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub(crate) fn container_count(&self) -> usize {
        self.state.lock().containers.len()
    }

    pub(crate) fn is_running(&self, id: &ContainerId) -> Option<bool> {
        self.state
            .lock()
            .containers
            .iter()
            .find(|c| c.id == id.as_str())
            .map(|c| c.running)
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    fn check(&self, op: Op) -> Result<(), ContainerError> {
        match self.state.lock().failures.get(&op) {
            Some(message) => Err(ContainerError::Runtime(message.clone())),
            None => Ok(()),
        }
    }

    fn with_container<T>(
        &self,
        id: &ContainerId,
        f: impl FnOnce(&mut FakeContainer) -> T,
    ) -> Result<T, ContainerError> {
        let mut state = self.state.lock();
        state
            .containers
            .iter_mut()
            .find(|c| c.id == id.as_str())
            .map(f)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }

    fn output_stream<E: Send + 'static>(&self) -> super::traits::OutputStream<E> {
        let chunks: Vec<Result<OutputChunk, E>> =
            self.state.lock().output.iter().cloned().map(Ok).collect();
        Box::pin(futures::stream::iter(chunks))
    }

    fn progress_stream(&self, fail: fn(String) -> ImageError) -> ProgressStream<'static> {
        let state = self.state.lock();
        let mut items: Vec<Result<ProgressEvent, ImageError>> =
            state.progress.iter().cloned().map(Ok).collect();
        if let Some(message) = &state.progress_failure {
            items.push(Err(fail(message.clone())));
        }
        Box::pin(futures::stream::iter(items))
    }
}

impl Sealed for FakeRuntime {}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn list_containers(&self, _all: bool) -> Result<Vec<ContainerSummary>, ContainerError> {
        self.record(Call::List);
        let delay = self.state.lock().list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .state
            .lock()
            .containers
            .iter()
            .map(|c| ContainerSummary {
                id: ContainerId::new(c.id.clone()),
                names: vec![c.name.clone()],
                image: c.image.clone(),
                state: if c.running { "running" } else { "exited" }.to_string(),
            })
            .collect())
    }

    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpec,
    ) -> Result<ContainerId, ContainerError> {
        self.record(Call::Create(name.to_string()));
        let id = self.add_container(name, false);
        self.with_container(&id, |c| c.image = spec.image.clone())?;
        Ok(id)
    }

    async fn start_container(
        &self,
        id: &ContainerId,
        _opts: &StartOptions,
    ) -> Result<(), ContainerError> {
        self.record(Call::Start(id.to_string()));
        self.check(Op::Start)?;
        self.with_container(id, |c| c.running = true)
    }

    async fn stop_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.record(Call::Stop(id.to_string()));
        self.with_container(id, |c| c.running = false)
    }

    async fn remove_container(
        &self,
        id: &ContainerId,
        flags: RemoveFlags,
    ) -> Result<(), ContainerError> {
        self.record(Call::Remove {
            id: id.to_string(),
            force: flags.force,
            volumes: flags.volumes,
        });
        self.check(Op::Remove)?;
        let mut state = self.state.lock();
        let before = state.containers.len();
        state.containers.retain(|c| c.id != id.as_str());
        if state.containers.len() == before {
            return Err(ContainerError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn inspect_container(
        &self,
        id: &ContainerId,
    ) -> Result<ContainerDetails, ContainerError> {
        self.record(Call::Inspect(id.to_string()));
        self.with_container(id, |c| ContainerDetails {
            id: ContainerId::new(c.id.clone()),
            name: c.name.trim_start_matches('/').to_string(),
            image: c.image.clone(),
            running: c.running,
            ports: c.ports.clone(),
            raw: serde_json::json!({ "Id": c.id, "Name": c.name }),
        })
    }

    async fn attach_container(
        &self,
        id: &ContainerId,
    ) -> Result<AttachedIo<ContainerError>, ContainerError> {
        self.record(Call::Attach(id.to_string()));
        self.check(Op::Attach)?;
        self.with_container(id, |_| ())?;
        Ok(AttachedIo {
            output: self.output_stream(),
            input: None,
        })
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        self.record(Call::Wait(id.to_string()));
        self.check(Op::Wait)?;
        let code = self.state.lock().exit_code;
        self.with_container(id, |c| c.running = false)?;
        Ok(code)
    }
}

#[async_trait]
impl ExecOps for FakeRuntime {
    async fn create_exec(
        &self,
        container: &ContainerId,
        spec: &ExecSpec,
    ) -> Result<ExecId, ExecError> {
        self.record(Call::CreateExec {
            container: container.to_string(),
            cmd: spec.cmd.iter().cloned().collect(),
        });
        let running = self
            .with_container(container, |c| c.running)
            .map_err(|_| ExecError::ContainerNotFound(container.to_string()))?;
        if !running {
            return Err(ExecError::ContainerNotRunning(container.to_string()));
        }
        Ok(ExecId::new(format!("exec-{container}")))
    }

    async fn start_exec(
        &self,
        exec: &ExecId,
        _tty: bool,
    ) -> Result<AttachedIo<ExecError>, ExecError> {
        self.record(Call::StartExec(exec.to_string()));
        Ok(AttachedIo {
            output: self.output_stream(),
            input: None,
        })
    }
}

impl ImageOps for FakeRuntime {
    fn build_image<'a>(&'a self, tag: &str, context: Bytes) -> ProgressStream<'a> {
        self.record(Call::Build {
            tag: tag.to_string(),
            context_len: context.len(),
        });
        self.progress_stream(ImageError::BuildFailed)
    }

    fn pull_image<'a>(&'a self, reference: &str) -> ProgressStream<'a> {
        self.record(Call::Pull(reference.to_string()));
        self.progress_stream(ImageError::PullFailed)
    }
}
