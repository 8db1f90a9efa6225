// ABOUTME: External command execution used by the provider drivers.
// ABOUTME: Wraps tokio::process behind a Shell trait so drivers can be scripted in tests.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;

/// A program invocation: executable, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(part: &str) -> String {
    if part.contains(' ') {
        format!("\"{part}\"")
    } else {
        part.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("error running command \"{command}\": {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("error running command \"{command}\" (exit code {code:?}): {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Runs external commands and captures their standard output.
#[async_trait]
pub trait Shell: Send + Sync {
    /// Run a command, returning its stdout. Non-zero exit is an error.
    async fn exec(&self, cmd: &CommandLine) -> Result<String, ShellError>;

    /// Run a command with administrator rights.
    async fn exec_elevated(&self, cmd: &CommandLine) -> Result<String, ShellError>;
}

/// Shell backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

#[async_trait]
impl Shell for SystemShell {
    async fn exec(&self, cmd: &CommandLine) -> Result<String, ShellError> {
        let command = cmd.to_string();
        tracing::debug!(%command, "executing command");

        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ShellError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!(%command, code = ?output.status.code(), %stderr, "command failed");
            return Err(ShellError::Failed {
                command,
                code: output.status.code(),
                // Some provider tools report errors on stdout only.
                stderr: if stderr.is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr
                },
            });
        }

        tracing::debug!(%command, %stdout, "command results");
        Ok(stdout)
    }

    async fn exec_elevated(&self, cmd: &CommandLine) -> Result<String, ShellError> {
        self.exec(&elevate(cmd)).await
    }
}

/// Wrap a command so it runs with administrator rights on this platform.
pub fn elevate(cmd: &CommandLine) -> CommandLine {
    let elevated = if cfg!(windows) {
        let arguments = cmd.args.join(" ").replace('\'', "''");
        CommandLine::new("powershell").args([
            "-NoProfile".to_string(),
            "-Command".to_string(),
            format!(
                "Start-Process -FilePath '{}' -ArgumentList '{}' -Verb RunAs -Wait",
                cmd.program, arguments
            ),
        ])
    } else {
        CommandLine::new("sudo")
            .arg(cmd.program.clone())
            .args(cmd.args.iter().cloned())
    };
    CommandLine {
        env: cmd.env.clone(),
        ..elevated
    }
}
