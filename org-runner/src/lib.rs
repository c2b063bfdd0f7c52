#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod exec;
pub mod listing;
pub mod options;
pub mod pages;
pub mod processor;
pub mod repository;
pub mod runner;
pub mod search;
pub mod summary;
pub mod vcs;
pub mod working_copy;

pub use exec::{CommandExecer, CommandOutput, ExecError, Execer};
pub use listing::ListingError;
pub use options::{clone_cache_key_from_string, CloneCacheKey, ContextEnricher, Options};
pub use pages::{decode_pages, decode_repository, DecodeError};
pub use processor::{from_fn, BoxError, ProcessContext, Processor};
pub use repository::Repository;
pub use runner::{ProcessError, Runner, RunnerConfig, RunnerError};
pub use search::{
    ArchiveCondition, Page, RepositoryFilter, SearchOptions, SearchOptionsError, SizeCondition,
    Source, Visibility,
};
pub use summary::RunSummary;
pub use working_copy::{WorkingCopies, WorkingCopy, WorkingCopyError};
