//! Scripted [`Execer`] that records calls instead of spawning processes.
//!
//! Every scoped or environment-extended copy shares the same recording and
//! handler, so a test can hand the execer to the runner and inspect all calls
//! made in any working copy afterwards.

use super::{command_line, CommandOutput, ExecError, Execer};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Produces the result of a recorded call.
pub type Handler = Arc<dyn Fn(&RecordedCall) -> Result<CommandOutput, ExecError> + Send + Sync>;

/// A command seen by a [`MockExecer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub dir: PathBuf,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
}

impl RecordedCall {
    /// The command and its arguments joined by spaces.
    #[must_use]
    pub fn command_line(&self) -> String {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        command_line(&self.command, &args)
    }

    /// Returns true if this is `command` with arguments starting with `prefix`.
    #[must_use]
    pub fn starts_with(&self, command: &str, prefix: &[&str]) -> bool {
        self.command == command
            && self.args.len() >= prefix.len()
            && self.args.iter().zip(prefix).all(|(arg, expected)| arg == expected)
    }

    /// Value of the environment variable set through [`Execer::with_env`].
    #[must_use]
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

struct Shared {
    calls: Mutex<Vec<RecordedCall>>,
    handler: Handler,
}

/// Recording [`Execer`] answering every call through a handler.
#[derive(Clone)]
pub struct MockExecer {
    dir: PathBuf,
    env: Vec<(String, String)>,
    shared: Arc<Shared>,
}

impl MockExecer {
    /// Creates a mock in which every command succeeds with empty output.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_handler(dir, |_| Ok(CommandOutput::default()))
    }

    /// Creates a mock answering calls with `handler`.
    pub fn with_handler<F>(dir: impl Into<PathBuf>, handler: F) -> Self
    where
        F: Fn(&RecordedCall) -> Result<CommandOutput, ExecError> + Send + Sync + 'static,
    {
        Self {
            dir: dir.into(),
            env: Vec::new(),
            shared: Arc::new(Shared {
                calls: Mutex::new(Vec::new()),
                handler: Arc::new(handler),
            }),
        }
    }

    /// All calls recorded so far, across every scoped copy.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.shared
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded calls of `command` whose arguments start with `prefix`.
    #[must_use]
    pub fn calls_matching(&self, command: &str, prefix: &[&str]) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(command, prefix))
            .collect()
    }
}

impl fmt::Debug for MockExecer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockExecer")
            .field("dir", &self.dir)
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Execer for MockExecer {
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
        if cancel.is_cancelled() {
            return Ok(CommandOutput {
                exit_code: -1,
                cancelled: true,
                ..Default::default()
            });
        }

        let call = RecordedCall {
            dir: self.dir.clone(),
            command: command.to_string(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
            env: self.env.clone(),
            stdin: stdin.map(<[u8]>::to_vec),
        };
        let result = (self.shared.handler)(&call);
        self.shared
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scoped_copies_share_the_recording() {
        let mock = MockExecer::with_handler("/work", |call| {
            if call.starts_with("git", &["rev-parse"]) {
                Ok(CommandOutput::success("main\n"))
            } else {
                Ok(CommandOutput::failure(1, "unknown"))
            }
        });
        let cancel = CancellationToken::new();

        let scoped = mock.scoped(Path::new("/work/repo")).with_env(&[("A", "1")]);
        let branch = scoped
            .run_checked(&cancel, "git", &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .unwrap();
        assert_eq!(branch, "main\n");
        assert!(scoped.run_checked(&cancel, "make", &[]).await.is_err());

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].dir, Path::new("/work/repo"));
        assert_eq!(calls[0].env_var("A"), Some("1"));
        assert_eq!(calls[1].command_line(), "make");
    }

    #[tokio::test]
    async fn cancelled_token_skips_the_handler() {
        let mock = MockExecer::new("");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let output = mock.run(&cancel, "git", &["fetch"]).await.unwrap();
        assert!(output.cancelled);
        assert!(mock.calls().is_empty());
    }
}
