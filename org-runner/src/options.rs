//! Per-run processing options.

use crate::processor::ProcessContext;
use crate::repository::Repository;
use std::fmt;
use std::sync::Arc;

/// Worker count used when [`Options::number_of_workers`] is zero.
pub const DEFAULT_NUMBER_OF_WORKERS: usize = 10;

/// Computes the cache key of a repository's working copy. An empty key
/// disables caching for that repository.
pub type CloneCacheKey = Arc<dyn Fn(&Repository) -> String + Send + Sync>;

/// Transforms the context handed to the processor of one repository.
pub type ContextEnricher = Arc<dyn Fn(ProcessContext, &Repository) -> ProcessContext + Send + Sync>;

/// How repositories are materialized and processed.
#[derive(Clone, Default)]
pub struct Options {
    /// Clone over HTTPS instead of SSH.
    pub use_https: bool,
    /// Sparse-checkout patterns. Empty clones everything.
    pub cloning_subset: Vec<String>,
    pub clone_cache_key: Option<CloneCacheKey>,
    /// Concurrent workers. Zero uses [`DEFAULT_NUMBER_OF_WORKERS`].
    pub number_of_workers: usize,
    /// Log repository lifecycle events at `info` instead of `debug`.
    pub debug: bool,
    pub context_enricher: Option<ContextEnricher>,
}

impl Options {
    /// Effective number of workers.
    #[must_use]
    pub fn workers(&self) -> usize {
        if self.number_of_workers == 0 {
            DEFAULT_NUMBER_OF_WORKERS
        } else {
            self.number_of_workers
        }
    }

    /// Cache key of a repository, if caching applies to it.
    #[must_use]
    pub fn cache_key(&self, repository: &Repository) -> Option<String> {
        self.clone_cache_key
            .as_ref()
            .map(|key| key(repository))
            .filter(|key| !key.is_empty())
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("use_https", &self.use_https)
            .field("cloning_subset", &self.cloning_subset)
            .field("clone_cache_key", &self.clone_cache_key.as_ref().map(|_| ".."))
            .field("number_of_workers", &self.number_of_workers)
            .field("debug", &self.debug)
            .field("context_enricher", &self.context_enricher.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Cache key function returning the same key for every repository.
pub fn clone_cache_key_from_string(key: impl Into<String>) -> CloneCacheKey {
    let key = key.into();
    Arc::new(move |_: &Repository| key.clone())
}
