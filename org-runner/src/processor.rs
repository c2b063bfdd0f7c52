//! The per-repository callback and the context it runs in.

use crate::exec::Execer;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Error type returned by processors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Ambient state handed to a processor.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    cancellation: CancellationToken,
    span: Span,
}

impl ProcessContext {
    /// Creates a context bound to the current span.
    #[must_use]
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            span: Span::current(),
        }
    }

    /// Token fired when the run is cancelled.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Span of the repository being processed.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Replaces the span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Replaces the cancellation token, e.g. with a child token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Work performed on every selected repository.
///
/// `exec` runs inside the repository's working copy, or in the process's
/// current directory when `is_empty` is set (empty repositories are never
/// cloned).
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(
        &self,
        ctx: ProcessContext,
        repository: &str,
        is_empty: bool,
        exec: Arc<dyn Execer>,
    ) -> Result<(), BoxError>;
}

/// [`Processor`] backed by an async closure; see [`from_fn`].
#[derive(Debug, Clone)]
pub struct FnProcessor<F>(F);

/// Wraps an async closure as a [`Processor`].
pub fn from_fn<F, Fut>(f: F) -> FnProcessor<F>
where
    F: Fn(ProcessContext, String, bool, Arc<dyn Execer>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    FnProcessor(f)
}

#[async_trait]
impl<F, Fut> Processor for FnProcessor<F>
where
    F: Fn(ProcessContext, String, bool, Arc<dyn Execer>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    async fn process(
        &self,
        ctx: ProcessContext,
        repository: &str,
        is_empty: bool,
        exec: Arc<dyn Execer>,
    ) -> Result<(), BoxError> {
        (self.0)(ctx, repository.to_string(), is_empty, exec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::MockExecer;
    use std::sync::Mutex;

    #[tokio::test]
    async fn closure_processor_receives_arguments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let processor = from_fn(move |ctx: ProcessContext, repository, is_empty, _exec| {
            let recorder = Arc::clone(&recorder);
            async move {
                assert!(!ctx.is_cancelled());
                recorder.lock().unwrap().push((repository, is_empty));
                Ok::<(), BoxError>(())
            }
        });

        let exec: Arc<dyn Execer> = Arc::new(MockExecer::new(""));
        let ctx = ProcessContext::new(CancellationToken::new());
        processor.process(ctx, "acme/a", true, exec).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![("acme/a".to_string(), true)]);
    }

    #[test]
    fn context_can_swap_cancellation() {
        let parent = CancellationToken::new();
        let ctx = ProcessContext::new(parent.clone()).with_cancellation(parent.child_token());
        parent.cancel();
        assert!(ctx.is_cancelled());
    }
}
