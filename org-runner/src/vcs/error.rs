//! Source-control helper error types.

use crate::exec::ExecError;
use thiserror::Error;

/// Errors that can occur in the source-control helpers.
#[derive(Debug, Error)]
pub enum VcsError {
    /// A branch name is not a valid git reference name.
    #[error("invalid branch name {branch:?}: {message}")]
    InvalidBranch { branch: String, message: String },

    /// A git or gh command failed.
    #[error("{action}: {source}")]
    Command {
        action: &'static str,
        #[source]
        source: ExecError,
    },

    /// One or more paths could not be added to the index.
    #[error("adding files: {}", join_errors(.0))]
    AddFiles(Vec<ExecError>),

    /// The pull request body could not be written to a file.
    #[error("creating PR body file: {0}")]
    BodyFile(#[source] std::io::Error),

    /// `gh pr view` printed something other than a pull request.
    #[error("unmarshaling existing PR: {0}")]
    ExistingPr(#[source] serde_json::Error),
}

fn join_errors(errors: &[ExecError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
