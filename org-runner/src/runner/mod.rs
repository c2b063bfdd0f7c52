//! Orchestrates organization and single-repository runs.

mod config;
mod error;
pub mod scheduler;

pub use config::{RunnerConfig, DEFAULT_GH_PROGRAM};
pub use error::{ProcessError, RunnerError};

use crate::exec::{CommandExecer, Execer};
use crate::listing::{fetch_repository, list_organization, ListingError};
use crate::options::Options;
use crate::processor::{ProcessContext, Processor};
use crate::repository::Repository;
use crate::search::SearchOptions;
use crate::summary::RunSummary;
use crate::working_copy::WorkingCopies;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Runs processors against GitHub repositories.
pub struct Runner {
    config: RunnerConfig,
    working_copies: Arc<WorkingCopies>,
    exec: Arc<dyn Execer>,
}

impl Runner {
    /// Builds a runner from the provided configuration, creating its base
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::BaseDir`] if the base directory cannot be
    /// created.
    pub fn new(config: RunnerConfig) -> Result<Self, RunnerError> {
        let working_copies = WorkingCopies::new(config.base_dir()).map_err(RunnerError::BaseDir)?;
        Ok(Self {
            config,
            working_copies: Arc::new(working_copies),
            exec: Arc::new(CommandExecer::default()),
        })
    }

    /// Replaces the command execution used for `gh`, `git` and processors.
    #[must_use]
    pub fn with_execer(mut self, exec: Arc<dyn Execer>) -> Self {
        self.exec = exec;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Working-copy manager, e.g. to purge cache entries.
    pub fn working_copies(&self) -> &WorkingCopies {
        &self.working_copies
    }

    /// Runs `processor` against every repository of `org` selected by
    /// `search`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] for invalid search options, a failed listing,
    /// the first failing repository, or cancellation.
    pub async fn run_for_organization(
        &self,
        cancel: &CancellationToken,
        org: &str,
        search: &SearchOptions,
        processor: Arc<dyn Processor>,
        options: &Options,
    ) -> Result<RunSummary, RunnerError> {
        let span = info_span!("organization", org = %org);

        async {
            let paging = search.paging()?;
            info!(
                per_page = paging.per_page,
                all_pages = paging.all_pages,
                "Listing repositories"
            );

            let pages = list_organization(
                cancel,
                self.exec.as_ref(),
                self.config.gh_program(),
                org,
                paging,
                search.cache,
            )
            .await
            .map_err(listing_error)?;

            let run = Arc::new(self.repository_run(processor, options));
            let task_cancel = cancel.clone();
            let summary = scheduler::run_concurrently(
                cancel,
                pages,
                options.workers(),
                search.make_filter_in(),
                move |repository| {
                    let run = Arc::clone(&run);
                    let cancel = task_cancel.clone();
                    async move { run.process(&cancel, &repository).await }
                },
            )
            .await?;

            info!(
                found = summary.found,
                inspected = summary.inspected,
                processed = summary.processed,
                "Organization run complete"
            );
            Ok::<_, RunnerError>(summary)
        }
        .instrument(span)
        .await
    }

    /// Runs `processor` against a single repository given as `owner/name`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] for an invalid name, a failed lookup, a failed
    /// processor (including a repository without default branch), or
    /// cancellation.
    pub async fn run_for_repository(
        &self,
        cancel: &CancellationToken,
        name: &str,
        processor: Arc<dyn Processor>,
        options: &Options,
    ) -> Result<(), RunnerError> {
        if name.is_empty() || name.matches('/').count() > 1 {
            return Err(RunnerError::InvalidRepositoryName(name.to_string()));
        }

        let repository = fetch_repository(cancel, self.exec.as_ref(), self.config.gh_program(), name)
            .await
            .map_err(listing_error)?;

        self.repository_run(processor, options)
            .process(cancel, &repository)
            .await
            .map_err(|source| RunnerError::Repository {
                name: repository.name.clone(),
                source,
            })
    }

    fn repository_run(&self, processor: Arc<dyn Processor>, options: &Options) -> RepositoryRun {
        RepositoryRun {
            working_copies: Arc::clone(&self.working_copies),
            exec: Arc::clone(&self.exec),
            processor,
            options: options.clone(),
        }
    }
}

fn listing_error(err: ListingError) -> RunnerError {
    if err.is_cancelled() {
        RunnerError::Cancelled
    } else {
        RunnerError::Listing(err)
    }
}

/// Everything needed to process one repository.
struct RepositoryRun {
    working_copies: Arc<WorkingCopies>,
    exec: Arc<dyn Execer>,
    processor: Arc<dyn Processor>,
    options: Options,
}

impl RepositoryRun {
    async fn process(
        &self,
        cancel: &CancellationToken,
        repository: &Repository,
    ) -> Result<(), ProcessError> {
        let span = info_span!("repository", repo = %repository.name);

        async {
            let mut ctx = ProcessContext::new(cancel.clone());
            if let Some(enrich) = &self.options.context_enricher {
                ctx = enrich(ctx, repository);
            }

            if repository.is_empty() {
                self.lifecycle("Processing empty repository");
                return self
                    .processor
                    .process(ctx, &repository.name, true, Arc::clone(&self.exec))
                    .await
                    .map_err(ProcessError::EmptyRepository);
            }

            let copy = self
                .working_copies
                .acquire(cancel, self.exec.as_ref(), repository, &self.options)
                .await?;
            self.lifecycle("Processing repository");

            let result = self
                .processor
                .process(ctx, &repository.name, false, self.exec.scoped(copy.path()))
                .await
                .map_err(ProcessError::Processor);

            let path = copy.path().to_path_buf();
            if let Err(err) = copy.close() {
                warn!(path = %path.display(), error = %err, "Failed to remove working copy");
            }
            self.lifecycle("Finished repository");
            result
        }
        .instrument(span)
        .await
    }

    fn lifecycle(&self, message: &str) {
        if self.options.debug {
            info!("{message}");
        } else {
            debug!("{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::{MockExecer, RecordedCall};
    use crate::exec::CommandOutput;
    use crate::processor::{from_fn, BoxError};
    use std::sync::Mutex;

    fn runner(root: &std::path::Path, mock: &MockExecer) -> Runner {
        Runner::new(RunnerConfig::new(root))
            .unwrap()
            .with_execer(Arc::new(mock.clone()))
    }

    fn recording_processor(seen: &Arc<Mutex<Vec<(String, bool, std::path::PathBuf)>>>) -> Arc<dyn Processor> {
        let seen = Arc::clone(seen);
        Arc::new(from_fn(move |_ctx, repository, is_empty, exec: Arc<dyn Execer>| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock()
                    .unwrap()
                    .push((repository, is_empty, exec.dir().to_path_buf()));
                Ok::<(), BoxError>(())
            }
        }))
    }

    #[tokio::test]
    async fn rejects_malformed_repository_names() {
        let root = tempfile::tempdir().unwrap();
        let mock = MockExecer::new("");
        let runner = runner(root.path(), &mock);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["", "acme/a/b"] {
            let err = runner
                .run_for_repository(
                    &CancellationToken::new(),
                    name,
                    recording_processor(&seen),
                    &Options::default(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, RunnerError::InvalidRepositoryName(_)));
        }
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_repository_skips_cloning() {
        let root = tempfile::tempdir().unwrap();
        let mock = MockExecer::with_handler("", |call: &RecordedCall| {
            assert_eq!(call.command, "gh");
            Ok(CommandOutput::success(
                r#"{"full_name":"acme/empty","default_branch":"","size":0}"#,
            ))
        });
        let runner = runner(root.path(), &mock);
        let seen = Arc::new(Mutex::new(Vec::new()));

        runner
            .run_for_repository(
                &CancellationToken::new(),
                "acme/empty",
                recording_processor(&seen),
                &Options::default(),
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "acme/empty");
        assert!(seen[0].1);
        assert_eq!(seen[0].2, std::path::PathBuf::new());
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn single_repository_runs_in_working_copy() {
        let root = tempfile::tempdir().unwrap();
        let mock = MockExecer::with_handler("", |call: &RecordedCall| {
            if call.command == "gh" {
                return Ok(CommandOutput::success(
                    r#"{"full_name":"acme/app","ssh_url":"git@github.com:acme/app.git","default_branch":"main","size":12}"#,
                ));
            }
            Ok(CommandOutput::default())
        });
        let runner = runner(root.path(), &mock);
        let seen = Arc::new(Mutex::new(Vec::new()));

        runner
            .run_for_repository(
                &CancellationToken::new(),
                "acme/app",
                recording_processor(&seen),
                &Options::default(),
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let (name, is_empty, dir) = &seen[0];
        assert_eq!(name, "acme/app");
        assert!(!is_empty);
        assert!(dir.starts_with(root.path().join("acme")));
        assert!(!dir.exists());
        assert_eq!(mock.calls_matching("git", &["fetch", "origin", "main"]).len(), 1);
    }

    #[tokio::test]
    async fn single_repository_without_branch_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let mock = MockExecer::with_handler("", |call: &RecordedCall| {
            if call.command == "gh" {
                return Ok(CommandOutput::success(
                    r#"{"full_name":"acme/new","default_branch":null,"size":3}"#,
                ));
            }
            Ok(CommandOutput::default())
        });
        let runner = runner(root.path(), &mock);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let err = runner
            .run_for_repository(
                &CancellationToken::new(),
                "acme/new",
                recording_processor(&seen),
                &Options::default(),
            )
            .await
            .unwrap_err();

        match err {
            RunnerError::Repository { name, source } => {
                assert_eq!(name, "acme/new");
                assert!(source.is_no_default_branch());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn context_enricher_sees_the_repository() {
        let root = tempfile::tempdir().unwrap();
        let mock = MockExecer::with_handler("", |_| {
            Ok(CommandOutput::success(r#"{"full_name":"acme/empty","size":0}"#))
        });
        let runner = runner(root.path(), &mock);
        let enriched = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&enriched);
        let options = Options {
            context_enricher: Some(Arc::new(move |ctx: ProcessContext, repository: &Repository| {
                recorder.lock().unwrap().push(repository.name.clone());
                ctx
            })),
            ..Default::default()
        };
        let seen = Arc::new(Mutex::new(Vec::new()));

        runner
            .run_for_repository(&CancellationToken::new(), "acme/empty", recording_processor(&seen), &options)
            .await
            .unwrap();
        assert_eq!(*enriched.lock().unwrap(), vec!["acme/empty".to_string()]);
    }

    #[tokio::test]
    async fn negative_per_page_fails_before_listing() {
        let root = tempfile::tempdir().unwrap();
        let mock = MockExecer::new("");
        let runner = runner(root.path(), &mock);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let search = SearchOptions {
            per_page: -1,
            ..Default::default()
        };

        let err = runner
            .run_for_organization(
                &CancellationToken::new(),
                "acme",
                &search,
                recording_processor(&seen),
                &Options::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidSearchOptions(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn cancelled_listing_reports_cancellation() {
        let root = tempfile::tempdir().unwrap();
        let mock = MockExecer::new("");
        let runner = runner(root.path(), &mock);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = runner
            .run_for_organization(
                &cancel,
                "acme",
                &SearchOptions::default(),
                recording_processor(&seen),
                &Options::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Cancelled));
    }
}
