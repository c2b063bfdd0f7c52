//! Fan-out of filtered repositories to a fixed pool of workers.
//!
//! One producer task walks the pages in order, counts every repository it
//! inspects and queues the accepted ones on a bounded channel. Workers share
//! the receiving end and process one repository at a time. The first worker
//! error or a cancellation stops the run: nothing new is dispatched, and
//! repositories still queued are drained without being processed.

use super::{ProcessError, RunnerError};
use crate::repository::Repository;
use crate::search::RepositoryFilter;
use crate::summary::RunSummary;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

enum Event {
    Cancelled,
    Failed(RunnerError),
    Produced { panicked: bool },
    Drained(Result<(), RunnerError>),
}

/// Processes every repository accepted by `filter` with `workers` concurrent
/// workers.
///
/// Repositories without a default branch are logged and skipped. Returns
/// exactly one outcome: the summary, the first processing error, or
/// [`RunnerError::Cancelled`]. On cancellation in-flight processors are not
/// awaited; they observe the same token.
///
/// # Errors
///
/// Returns [`RunnerError::Repository`] for the first failing repository,
/// [`RunnerError::Cancelled`] or [`RunnerError::TaskPanicked`].
pub async fn run_concurrently<F, Fut>(
    cancel: &CancellationToken,
    pages: Vec<Vec<Repository>>,
    workers: usize,
    filter: RepositoryFilter,
    process: F,
) -> Result<RunSummary, RunnerError>
where
    F: Fn(Repository) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProcessError>> + Send + 'static,
{
    let workers = workers.max(1);
    let found = pages.iter().map(Vec::len).sum();
    let summary = Arc::new(Mutex::new(RunSummary::new(found)));
    let done = CancellationToken::new();

    let (work_tx, work_rx) = mpsc::channel::<Repository>(workers);
    let work_rx = Arc::new(tokio::sync::Mutex::new(work_rx));
    // Every worker reports at most one error, so sends never block.
    let (error_tx, mut error_rx) = mpsc::channel::<RunnerError>(workers);
    let process = Arc::new(process);

    let mut pool = JoinSet::new();
    for id in 0..workers {
        let work_rx = Arc::clone(&work_rx);
        let error_tx = error_tx.clone();
        let cancel = cancel.clone();
        let done = done.clone();
        let process = Arc::clone(&process);

        pool.spawn(
            async move {
                loop {
                    let next = work_rx.lock().await.recv().await;
                    let Some(repository) = next else { break };
                    if cancel.is_cancelled() || done.is_cancelled() {
                        continue;
                    }

                    let name = repository.name.clone();
                    match process(repository).await {
                        Ok(()) => {}
                        Err(err) if err.is_no_default_branch() => {
                            warn!(repo = %name, "Skipping repository without default branch");
                        }
                        Err(source) => {
                            let _ = error_tx.send(RunnerError::Repository { name, source }).await;
                            break;
                        }
                    }
                }
                debug!(worker = id, "Worker finished");
            }
            .in_current_span(),
        );
    }
    drop(error_tx);

    let mut producer = spawn_producer(cancel, &done, pages, filter, work_tx, Arc::clone(&summary));
    let mut produced = false;

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => Event::Cancelled,
            Some(err) = error_rx.recv() => Event::Failed(err),
            joined = &mut producer, if !produced => Event::Produced {
                panicked: joined.is_err_and(|err| err.is_panic()),
            },
            drained = drain(&mut pool), if produced => Event::Drained(drained),
        };

        match event {
            Event::Cancelled => {
                done.cancel();
                producer.abort();
                pool.detach_all();
                return Err(RunnerError::Cancelled);
            }
            Event::Failed(err) => {
                done.cancel();
                producer.abort();
                drain(&mut pool).await?;
                return Err(err);
            }
            Event::Produced { panicked: true } => {
                done.cancel();
                drain(&mut pool).await?;
                return Err(RunnerError::TaskPanicked { task: "producer" });
            }
            Event::Produced { panicked: false } => produced = true,
            Event::Drained(drained) => {
                drained?;
                break;
            }
        }
    }

    if let Ok(err) = error_rx.try_recv() {
        return Err(err);
    }
    if cancel.is_cancelled() {
        return Err(RunnerError::Cancelled);
    }

    let summary = *summary.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(summary)
}

fn spawn_producer(
    cancel: &CancellationToken,
    done: &CancellationToken,
    pages: Vec<Vec<Repository>>,
    filter: RepositoryFilter,
    work_tx: mpsc::Sender<Repository>,
    summary: Arc<Mutex<RunSummary>>,
) -> JoinHandle<()> {
    let cancel = cancel.clone();
    let done = done.clone();

    tokio::spawn(
        async move {
            for repository in pages.into_iter().flatten() {
                let accepted = filter.matches(&repository);
                summary
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(accepted);
                if !accepted {
                    continue;
                }

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = done.cancelled() => break,
                    sent = work_tx.send(repository) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        .in_current_span(),
    )
}

async fn drain(pool: &mut JoinSet<()>) -> Result<(), RunnerError> {
    let mut panicked = false;
    while let Some(joined) = pool.join_next().await {
        if joined.is_err_and(|err| err.is_panic()) {
            panicked = true;
        }
    }

    if panicked {
        Err(RunnerError::TaskPanicked { task: "worker" })
    } else {
        Ok(())
    }
}
