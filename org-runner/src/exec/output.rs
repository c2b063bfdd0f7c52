//! Captured command output.

use super::ExecError;

/// Output of a finished (or cancelled) command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `-1` when the process was killed by a signal or cancelled.
    pub exit_code: i32,
    pub cancelled: bool,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Failed output with the given exit code and stderr.
    #[must_use]
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code,
            ..Default::default()
        }
    }

    /// Returns stdout without surrounding whitespace.
    #[must_use]
    pub fn trim_stdout(&self) -> &str {
        self.stdout.trim()
    }

    /// Returns true if the command ran to completion with exit code zero.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.exit_code == 0
    }

    /// Converts into stdout, failing on cancellation or a non-zero exit code.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Cancelled`] or [`ExecError::ExitCode`].
    pub fn into_checked(self, command_line: String) -> Result<String, ExecError> {
        if self.cancelled {
            return Err(ExecError::Cancelled {
                command: command_line,
            });
        }

        if self.exit_code != 0 {
            return Err(ExecError::ExitCode {
                command: command_line,
                exit_code: self.exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            });
        }

        Ok(self.stdout)
    }
}
