//! Runner error types.

use crate::listing::ListingError;
use crate::processor::BoxError;
use crate::search::SearchOptionsError;
use crate::working_copy::WorkingCopyError;

/// Errors that can end a run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The working-copy root could not be created.
    #[error(transparent)]
    BaseDir(WorkingCopyError),

    /// Search options that cannot be turned into a listing request.
    #[error(transparent)]
    InvalidSearchOptions(#[from] SearchOptionsError),

    /// Listing or looking up repositories failed.
    #[error(transparent)]
    Listing(#[from] ListingError),

    /// A repository name that is not `owner/name`.
    #[error("invalid repository name {0:?}")]
    InvalidRepositoryName(String),

    /// Processing one repository failed.
    #[error("processing {name:?}: {source}")]
    Repository {
        name: String,
        #[source]
        source: ProcessError,
    },

    /// The run was cancelled before it finished.
    #[error("run cancelled")]
    Cancelled,

    /// A worker or the producer panicked.
    #[error("{task} task panicked")]
    TaskPanicked { task: &'static str },
}

/// Errors for a single repository.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Materializing the working copy failed.
    #[error(transparent)]
    WorkingCopy(#[from] WorkingCopyError),

    /// The processor failed on an empty repository.
    #[error("processing empty repository: {0}")]
    EmptyRepository(#[source] BoxError),

    /// The processor failed.
    #[error("processing repository: {0}")]
    Processor(#[source] BoxError),
}

impl ProcessError {
    /// Returns true for repositories skipped because they have no branch.
    #[must_use]
    pub fn is_no_default_branch(&self) -> bool {
        matches!(self, Self::WorkingCopy(WorkingCopyError::NoDefaultBranch))
    }
}
