//! External command execution.
//!
//! Everything that shells out (the listing call, working-copy
//! materialization, processors) goes through the [`Execer`] capability so that
//! the process mechanism can be swapped out, e.g. for [`mock::MockExecer`] in
//! tests.

mod error;
pub mod mock;
mod output;

pub use error::ExecError;
pub use output::CommandOutput;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs commands inside a working directory.
///
/// Implementations must kill (or never start) the command once the
/// cancellation token fires and report it through
/// [`CommandOutput::cancelled`].
#[async_trait]
pub trait Execer: Send + Sync {
    /// Working directory of the commands. Empty means the process's current
    /// directory.
    fn dir(&self) -> &Path;

    /// Returns an execer of the same kind running in `dir`.
    fn scoped(&self, dir: &Path) -> Arc<dyn Execer>;

    /// Returns an execer with the given variables added to the environment.
    fn with_env(&self, vars: &[(&str, &str)]) -> Arc<dyn Execer>;

    /// Runs a command, optionally feeding `stdin` to it.
    async fn run_with_stdin(
        &self,
        cancel: &CancellationToken,
        stdin: Option<&[u8]>,
        command: &str,
        args: &[&str],
    ) -> Result<CommandOutput, ExecError>;

    /// Returns an execer for an existing subdirectory.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::NotADirectory`] if `subpath` is not a directory.
    fn sub(&self, subpath: &str) -> Result<Arc<dyn Execer>, ExecError> {
        let dir = self.dir().join(subpath);
        if !dir.is_dir() {
            return Err(ExecError::NotADirectory { path: dir });
        }
        Ok(self.scoped(&dir))
    }

    /// Runs a command without stdin. A non-zero exit code is not an error.
    async fn run(
        &self,
        cancel: &CancellationToken,
        command: &str,
        args: &[&str],
    ) -> Result<CommandOutput, ExecError> {
        self.run_with_stdin(cancel, None, command, args).await
    }

    /// Runs a command and returns its stdout, failing on a non-zero exit code.
    async fn run_checked(
        &self,
        cancel: &CancellationToken,
        command: &str,
        args: &[&str],
    ) -> Result<String, ExecError> {
        self.run(cancel, command, args)
            .await?
            .into_checked(command_line(command, args))
    }

    /// Like [`Execer::run_checked`], feeding `stdin` to the command.
    async fn run_with_stdin_checked(
        &self,
        cancel: &CancellationToken,
        stdin: &[u8],
        command: &str,
        args: &[&str],
    ) -> Result<String, ExecError> {
        self.run_with_stdin(cancel, Some(stdin), command, args)
            .await?
            .into_checked(command_line(command, args))
    }
}

/// Formats a command and its arguments for messages.
#[must_use]
pub fn command_line(command: &str, args: &[&str]) -> String {
    let mut line = command.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// [`Execer`] backed by real processes.
#[derive(Debug, Clone, Default)]
pub struct CommandExecer {
    dir: PathBuf,
    env: Vec<(String, String)>,
    print_commands: bool,
}

impl CommandExecer {
    /// Creates an execer running commands in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            env: Vec::new(),
            print_commands: false,
        }
    }

    /// Logs every command at `info` instead of `debug`.
    #[must_use]
    pub fn with_print_commands(mut self, print_commands: bool) -> Self {
        self.print_commands = print_commands;
        self
    }
}

#[async_trait]
impl Execer for CommandExecer {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn scoped(&self, dir: &Path) -> Arc<dyn Execer> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            ..self.clone()
        })
    }

    fn with_env(&self, vars: &[(&str, &str)]) -> Arc<dyn Execer> {
        let mut execer = self.clone();
        execer.env.extend(
            vars.iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string())),
        );
        Arc::new(execer)
    }

    async fn run_with_stdin(
        &self,
        cancel: &CancellationToken,
        stdin: Option<&[u8]>,
        command: &str,
        args: &[&str],
    ) -> Result<CommandOutput, ExecError> {
        let command_line = command_line(command, args);
        if self.print_commands {
            info!(dir = %self.dir.display(), command = %command_line, "Executing command");
        } else {
            debug!(dir = %self.dir.display(), command = %command_line, "Executing command");
        }

        if cancel.is_cancelled() {
            return Ok(cancelled_output());
        }

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(self.env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !self.dir.as_os_str().is_empty() {
            cmd.current_dir(&self.dir);
        }

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            let input = input.to_vec();
            tokio::spawn(async move {
                // The child may exit before consuming all of its input.
                let _ = pipe.write_all(&input).await;
            });
        }

        tokio::select! {
            output = child.wait_with_output() => {
                let output = output.map_err(|source| ExecError::Spawn {
                    command: command_line,
                    source,
                })?;
                Ok(CommandOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code().unwrap_or(-1),
                    cancelled: false,
                })
            }
            () = cancel.cancelled() => {
                debug!(command = %command_line, "Command cancelled");
                Ok(cancelled_output())
            }
        }
    }
}

fn cancelled_output() -> CommandOutput {
    CommandOutput {
        exit_code: -1,
        cancelled: true,
        ..Default::default()
    }
}
