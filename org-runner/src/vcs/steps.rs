//! Composable source-control steps.

use super::{add_files, checkout_new_branch, commit, push, VcsError};
use crate::exec::Execer;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// One source-control action run against a working copy.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, cancel: &CancellationToken, exec: &dyn Execer) -> Result<(), VcsError>;
}

/// Runs steps in order, stopping at the first failure.
///
/// # Errors
///
/// Returns the error of the first failing step.
pub async fn run_steps(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    steps: &[&dyn Step],
) -> Result<(), VcsError> {
    for step in steps {
        step.run(cancel, exec).await?;
    }
    Ok(())
}

/// See [`checkout_new_branch`].
#[derive(Debug, Clone)]
pub struct CheckoutNewBranch {
    name: String,
}

impl CheckoutNewBranch {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Step for CheckoutNewBranch {
    async fn run(&self, cancel: &CancellationToken, exec: &dyn Execer) -> Result<(), VcsError> {
        checkout_new_branch(cancel, exec, &self.name).await
    }
}

/// See [`add_files`].
#[derive(Debug, Clone)]
pub struct AddFiles {
    paths: Vec<String>,
}

impl AddFiles {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Step for AddFiles {
    async fn run(&self, cancel: &CancellationToken, exec: &dyn Execer) -> Result<(), VcsError> {
        add_files(cancel, exec, &self.paths).await
    }
}

/// See [`commit`].
#[derive(Debug, Clone)]
pub struct Commit {
    message: String,
    flags: Vec<String>,
}

impl Commit {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            flags: Vec::new(),
        }
    }

    /// Adds an extra `git commit` flag, e.g. `--no-verify`.
    #[must_use]
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }
}

#[async_trait]
impl Step for Commit {
    async fn run(&self, cancel: &CancellationToken, exec: &dyn Execer) -> Result<(), VcsError> {
        commit(cancel, exec, &self.message, &self.flags).await
    }
}

/// See [`push`].
#[derive(Debug, Clone, Default)]
pub struct Push {
    branch: Option<String>,
    force: bool,
}

impl Push {
    /// Pushes `branch` to `origin`.
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            force: false,
        }
    }

    /// Pushes the current branch to its upstream.
    #[must_use]
    pub fn upstream() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }
}

#[async_trait]
impl Step for Push {
    async fn run(&self, cancel: &CancellationToken, exec: &dyn Execer) -> Result<(), VcsError> {
        push(cancel, exec, self.branch.as_deref(), self.force).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::{MockExecer, RecordedCall};
    use crate::exec::CommandOutput;

    #[tokio::test]
    async fn runs_steps_in_order() {
        let mock = MockExecer::new("/repo");
        let cancel = CancellationToken::new();

        run_steps(
            &cancel,
            &mock,
            &[
                &CheckoutNewBranch::new("bump"),
                &AddFiles::new(["go.mod"]),
                &Commit::new("bump").flag("--no-verify"),
                &Push::new("bump").force(),
            ],
        )
        .await
        .unwrap();

        let calls: Vec<String> = mock.calls().iter().map(RecordedCall::command_line).collect();
        assert_eq!(
            calls,
            vec![
                "git checkout -b bump",
                "git add go.mod",
                "git commit -m bump --no-verify",
                "git push --force origin bump",
            ]
        );
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let mock = MockExecer::with_handler("/repo", |call: &RecordedCall| {
            if call.starts_with("git", &["commit"]) {
                Ok(CommandOutput::failure(1, "nothing to commit"))
            } else {
                Ok(CommandOutput::default())
            }
        });

        let err = run_steps(
            &CancellationToken::new(),
            &mock,
            &[&Commit::new("empty"), &Push::upstream()],
        )
        .await
        .unwrap_err();

        assert!(err.to_string().starts_with("committing changes: "));
        assert_eq!(mock.calls_matching("git", &["push"]).len(), 0);
    }
}
