//! Command execution error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running an external command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command could not be started or awaited.
    #[error("{command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited with a non-zero status.
    #[error("{command}: exit code {exit_code}")]
    ExitCode {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// The command was killed because the run was cancelled.
    #[error("{command}: cancelled")]
    Cancelled { command: String },

    /// A scoped execer was requested for something that is not a directory.
    #[error("subpath {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },
}

impl ExecError {
    /// Returns the captured stderr of a failed command.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ExitCode { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Returns the captured stdout of a failed command.
    #[must_use]
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::ExitCode { stdout, .. } => Some(stdout),
            _ => None,
        }
    }

    /// Returns the exit code of a failed command.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExitCode { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}
