//! Working-copy error types.

use crate::exec::ExecError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while materializing a working copy.
#[derive(Debug, Error)]
pub enum WorkingCopyError {
    /// The repository has no default branch to check out.
    #[error("no default branch")]
    NoDefaultBranch,

    /// The default branch is not a valid git reference name.
    #[error("invalid branch name {branch:?}: {message}")]
    InvalidBranch { branch: String, message: String },

    /// A git command failed.
    #[error("{step}: {source}")]
    Git {
        step: &'static str,
        #[source]
        source: ExecError,
    },

    /// Something other than a directory sits at a cache entry's path.
    #[error("unexpected file in cloning directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// A filesystem operation failed.
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkingCopyError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }

    /// Returns true if a git command was killed by cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Git {
                source: ExecError::Cancelled { .. },
                ..
            }
        )
    }
}
