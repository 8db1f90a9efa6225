// ABOUTME: Exec sessions: interactive (one combined stream) or batch (demultiplexed).
// ABOUTME: A pump task feeds channels and reports completion; batch sessions fail on first stderr.

use super::error::EngineError;
use crate::runtime::{AttachedIo, OutputChunk};
use crate::runtime::traits::{InputSink, OutputStream};
use bytes::Bytes;
use futures::StreamExt;
use futures::channel::mpsc::{self, UnboundedReceiver};
use nonempty::NonEmpty;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// What to run and whether to attach a pseudo-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    pub cmd: NonEmpty<String>,
    pub tty: bool,
}

impl ExecOptions {
    pub fn batch(cmd: NonEmpty<String>) -> Self {
        Self { cmd, tty: false }
    }

    pub fn interactive(cmd: NonEmpty<String>) -> Self {
        Self { cmd, tty: true }
    }
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self::batch(NonEmpty::new("bash".to_string()))
    }
}

/// A started exec session.
///
/// With a pseudo-terminal the remote side merges stdout and stderr, so an
/// interactive session only has one output stream.
pub enum ExecSession {
    Interactive(InteractiveExec),
    Batch(BatchExec),
}

impl std::fmt::Debug for ExecSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecSession::Interactive(_) => f.write_str("ExecSession::Interactive"),
            ExecSession::Batch(_) => f.write_str("ExecSession::Batch"),
        }
    }
}

pub struct InteractiveExec {
    pub output: UnboundedReceiver<Bytes>,
    pub completion: Completion,
}

pub struct BatchExec {
    pub stdout: UnboundedReceiver<Bytes>,
    pub stderr: UnboundedReceiver<Bytes>,
    pub completion: Completion,
}

impl BatchExec {
    /// Wait for completion and return everything written to stdout.
    pub async fn collect_stdout(self) -> Result<String, EngineError> {
        let BatchExec {
            stdout, completion, ..
        } = self;
        completion.wait().await?;
        let chunks: Vec<Bytes> = stdout.collect().await;
        let bytes: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Resolves when the remote side closes the stream.
pub struct Completion {
    done: oneshot::Receiver<Result<(), EngineError>>,
    stdin: Option<JoinHandle<()>>,
}

impl Completion {
    pub async fn wait(self) -> Result<(), EngineError> {
        let result = self.done.await.unwrap_or_else(|_| {
            Err(EngineError::InternalInvariant(
                "exec output pump stopped without reporting".to_string(),
            ))
        });
        if let Some(stdin) = self.stdin {
            stdin.abort();
        }
        result
    }
}

/// Forward `reader` into the session's input until either side closes.
pub(crate) fn forward_input<R>(mut reader: R, mut input: InputSink) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = tokio::io::copy(&mut reader, &mut input).await {
            tracing::debug!(error = %e, "stdin forwarding ended");
        }
        let _ = input.shutdown().await;
    })
}

pub(crate) fn interactive<E>(io: AttachedIo<E>, stdin: Option<JoinHandle<()>>) -> InteractiveExec
where
    E: Into<EngineError> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded();
    let (done_tx, done_rx) = oneshot::channel();
    let mut output = io.output;

    tokio::spawn(async move {
        let mut result = Ok(());
        while let Some(item) = output.next().await {
            match item {
                Ok(chunk) => {
                    let _ = tx.unbounded_send(chunk.bytes().clone());
                }
                Err(e) => {
                    result = Err(e.into());
                    break;
                }
            }
        }
        drop(tx);
        let _ = done_tx.send(result);
    });

    InteractiveExec {
        output: rx,
        completion: Completion {
            done: done_rx,
            stdin,
        },
    }
}

pub(crate) fn batch<E>(io: AttachedIo<E>) -> BatchExec
where
    E: Into<EngineError> + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded();
    let (err_tx, err_rx) = mpsc::unbounded();
    let (done_tx, done_rx) = oneshot::channel();
    let mut output = io.output;

    tokio::spawn(async move {
        let mut done_tx = Some(done_tx);
        while let Some(item) = output.next().await {
            match item {
                Ok(OutputChunk::Stderr(bytes)) => {
                    // The first stderr chunk decides the outcome; later output still flows.
                    if let Some(tx) = done_tx.take() {
                        let text = String::from_utf8_lossy(&bytes).trim_end().to_string();
                        let _ = tx.send(Err(EngineError::Stderr(text)));
                    }
                    let _ = err_tx.unbounded_send(bytes);
                }
                Ok(OutputChunk::Stdout(bytes) | OutputChunk::Console(bytes)) => {
                    let _ = out_tx.unbounded_send(bytes);
                }
                Err(e) => {
                    if let Some(tx) = done_tx.take() {
                        let _ = tx.send(Err(e.into()));
                    }
                    return;
                }
            }
        }
        drop(out_tx);
        drop(err_tx);
        if let Some(tx) = done_tx.take() {
            let _ = tx.send(Ok(()));
        }
    });

    BatchExec {
        stdout: out_rx,
        stderr: err_rx,
        completion: Completion {
            done: done_rx,
            stdin: None,
        },
    }
}

/// Copy a session's output to `out` until the stream ends.
pub(crate) async fn pipe_output<E, W>(
    mut output: OutputStream<E>,
    out: &mut W,
) -> Result<(), EngineError>
where
    E: Into<EngineError>,
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = output.next().await {
        let chunk = chunk.map_err(Into::into)?;
        out.write_all(chunk.bytes()).await?;
        out.flush().await?;
    }
    Ok(())
}

/// Copy an interactive session's output to `out`, then wait for it.
pub(crate) async fn drain_interactive<W>(
    session: InteractiveExec,
    out: &mut W,
) -> Result<(), EngineError>
where
    W: AsyncWrite + Unpin,
{
    let InteractiveExec {
        mut output,
        completion,
    } = session;
    while let Some(bytes) = output.next().await {
        out.write_all(&bytes).await?;
        out.flush().await?;
    }
    completion.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ExecError;

    fn io(chunks: Vec<Result<OutputChunk, ExecError>>) -> AttachedIo<ExecError> {
        AttachedIo {
            output: Box::pin(futures::stream::iter(chunks)),
            input: None,
        }
    }

    fn stdout(s: &'static str) -> Result<OutputChunk, ExecError> {
        Ok(OutputChunk::Stdout(Bytes::from_static(s.as_bytes())))
    }

    fn stderr(s: &'static str) -> Result<OutputChunk, ExecError> {
        Ok(OutputChunk::Stderr(Bytes::from_static(s.as_bytes())))
    }

    #[tokio::test]
    async fn batch_collects_stdout_on_clean_end() {
        let session = batch(io(vec![stdout("hello "), stdout("world\n")]));
        assert_eq!(session.collect_stdout().await.unwrap(), "hello world\n");
    }

    #[tokio::test]
    async fn batch_rejects_on_stderr_even_if_stdout_completes() {
        let session = batch(io(vec![
            stdout("partial"),
            stderr("warning: disk almost full\n"),
            stdout(" rest\n"),
        ]));

        let err = session.completion.wait().await.unwrap_err();
        match err {
            EngineError::Stderr(text) => assert_eq!(text, "warning: disk almost full"),
            other => panic!("expected stderr rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_demultiplexes_streams() {
        let session = batch(io(vec![stdout("out"), stderr("err")]));
        let BatchExec {
            stdout, stderr, completion,
        } = session;
        let _ = completion.wait().await;

        let out: Vec<Bytes> = stdout.collect().await;
        let err: Vec<Bytes> = stderr.collect().await;
        assert_eq!(out, vec![Bytes::from_static(b"out")]);
        assert_eq!(err, vec![Bytes::from_static(b"err")]);
    }

    #[tokio::test]
    async fn batch_propagates_transport_errors() {
        let session = batch(io(vec![
            stdout("x"),
            Err(ExecError::Failed("connection reset".into())),
        ]));
        let err = session.completion.wait().await.unwrap_err();
        assert!(matches!(err, EngineError::Exec(ExecError::Failed(_))));
    }

    #[tokio::test]
    async fn interactive_merges_everything_into_one_stream() {
        let session = interactive(
            io(vec![
                Ok(OutputChunk::Console(Bytes::from_static(b"$ "))),
                stderr("oops"),
            ]),
            None,
        );

        let mut out = Vec::new();
        drain_interactive(session, &mut out).await.unwrap();
        assert_eq!(out, b"$ oops");
    }
}
