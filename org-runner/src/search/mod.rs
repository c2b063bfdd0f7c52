//! Repository search options and the predicate chain built from them.

mod conditions;

pub use conditions::{ArchiveCondition, Page, ParseConditionError, SizeCondition, Source, Visibility};

use crate::repository::Repository;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Page size used when none (or an oversized one) is requested.
pub const DEFAULT_PER_PAGE: i32 = 100;

/// Largest page size passed through to the listing call.
pub const MAX_PER_PAGE: i32 = 1000;

/// Caller-supplied inclusion predicate.
pub type FilterIn = Arc<dyn Fn(&Repository) -> bool + Send + Sync>;

type Check = Box<dyn Fn(&Repository) -> bool + Send + Sync>;

/// Errors for search options that cannot be turned into a listing request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchOptionsError {
    #[error("invalid negative per-page value {0}")]
    NegativePerPage(i32),

    #[error("invalid negative page {0}")]
    NegativePage(i32),
}

/// Which repositories of an organization to fetch and let through.
#[derive(Clone, Default)]
pub struct SearchOptions {
    /// Languages to keep, e.g. `["Go"]`. Empty keeps every language.
    pub languages: Vec<String>,
    pub archive_condition: ArchiveCondition,
    pub visibility: Visibility,
    pub source: Source,
    /// Repositories per page. Zero uses [`DEFAULT_PER_PAGE`].
    pub per_page: i32,
    pub page: Page,
    pub size_condition: SizeCondition,
    /// Custom predicate, evaluated before every other check.
    pub filter_in: Option<FilterIn>,
    /// How long the listing response may be served from the `gh` cache.
    pub cache: Option<Duration>,
}

impl fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("languages", &self.languages)
            .field("archive_condition", &self.archive_condition)
            .field("visibility", &self.visibility)
            .field("source", &self.source)
            .field("per_page", &self.per_page)
            .field("page", &self.page)
            .field("size_condition", &self.size_condition)
            .field("filter_in", &self.filter_in.as_ref().map(|_| ".."))
            .field("cache", &self.cache)
            .finish()
    }
}

/// Effective pagination of a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub per_page: u32,
    /// Specific page to request, if any.
    pub page: Option<u32>,
    /// Whether every page is fetched.
    pub all_pages: bool,
}

impl SearchOptions {
    /// Resolves `per_page` and `page` into the request that will be made.
    ///
    /// # Errors
    ///
    /// Returns [`SearchOptionsError`] for negative values other than the
    /// "all pages" sentinel.
    pub fn paging(&self) -> Result<Paging, SearchOptionsError> {
        let per_page = match self.per_page {
            0 => DEFAULT_PER_PAGE,
            n if n > MAX_PER_PAGE => DEFAULT_PER_PAGE,
            n if n > 0 => n,
            n => return Err(SearchOptionsError::NegativePerPage(n)),
        };

        let (page, all_pages) = match self.page {
            Page::All => (None, true),
            Page::Number(0) => (None, false),
            Page::Number(n) if n > 0 => (Some(n.unsigned_abs()), false),
            Page::Number(n) => return Err(SearchOptionsError::NegativePage(n)),
        };

        Ok(Paging {
            per_page: per_page.unsigned_abs(),
            page,
            all_pages,
        })
    }

    /// Builds the combined inclusion predicate for these options.
    ///
    /// Checks run in a fixed order (custom predicate, language, archive
    /// condition, source, visibility, size) and stop at the first failure.
    #[must_use]
    pub fn make_filter_in(&self) -> RepositoryFilter {
        let mut checks: Vec<Check> = Vec::new();

        if let Some(filter_in) = &self.filter_in {
            let filter_in = Arc::clone(filter_in);
            checks.push(Box::new(move |r: &Repository| filter_in(r)));
        }

        if !self.languages.is_empty() {
            let languages = self.languages.clone();
            checks.push(Box::new(move |r: &Repository| {
                r.language
                    .as_deref()
                    .is_some_and(|language| languages.iter().any(|l| l == language))
            }));
        }

        match self.archive_condition {
            ArchiveCondition::IncludeArchived => {}
            ArchiveCondition::OnlyArchived => checks.push(Box::new(|r: &Repository| r.archived)),
            ArchiveCondition::OmitArchived => checks.push(Box::new(|r: &Repository| !r.archived)),
        }

        match self.source {
            Source::All => {}
            Source::OnlyForks => checks.push(Box::new(|r: &Repository| r.fork)),
            Source::OnlyNonForks => checks.push(Box::new(|r: &Repository| !r.fork)),
        }

        if self.visibility != Visibility::Any {
            let visibility = self.visibility.as_str();
            checks.push(Box::new(move |r: &Repository| r.visibility == visibility));
        }

        match self.size_condition {
            SizeCondition::All => {}
            SizeCondition::NotEmpty => checks.push(Box::new(|r: &Repository| r.size > 0)),
            SizeCondition::OnlyEmpty => checks.push(Box::new(|r: &Repository| r.size == 0)),
        }

        RepositoryFilter { checks }
    }
}

/// Conjunction of the checks enabled in a [`SearchOptions`].
pub struct RepositoryFilter {
    checks: Vec<Check>,
}

impl RepositoryFilter {
    /// Returns true if every enabled check accepts the repository.
    #[must_use]
    pub fn matches(&self, repository: &Repository) -> bool {
        self.checks.iter().all(|check| check(repository))
    }

    /// Number of enabled checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Returns true if no check is enabled, i.e. everything passes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl fmt::Debug for RepositoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryFilter")
            .field("checks", &self.checks.len())
            .finish()
    }
}
