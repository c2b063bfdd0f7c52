//! Source-control helpers for processors.
//!
//! Thin wrappers over `git` and `gh` that run through an [`Execer`], usually
//! the one a processor receives for its working copy:
//!
//! ```ignore
//! vcs::run_steps(&cancel, exec.as_ref(), &[
//!     &CheckoutNewBranch::new("chore/bump-go"),
//!     &AddFiles::new(["go.mod", "go.sum"]),
//!     &Commit::new("chore: bump go"),
//!     &Push::new("chore/bump-go"),
//! ])
//! .await?;
//! ```

mod error;
mod pull_request;
mod steps;

pub use error::VcsError;
pub use pull_request::{create_pr_if_not_exist, PrOptions, PR_BODY_MAX_LEN};
pub use steps::{run_steps, AddFiles, CheckoutNewBranch, Commit, Push, Step};

use crate::exec::Execer;
use bstr::BStr;
use tokio_util::sync::CancellationToken;

/// One entry of `git status -s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Two-letter status code without padding, e.g. `M`, `??`, `AM`.
    pub status: String,
    pub path: String,
}

/// Validates a branch name before it is passed to git.
///
/// Names starting with `-` are rejected so they cannot be read as options.
pub(crate) fn check_branch_name(branch: &str) -> Result<(), String> {
    if branch.starts_with('-') {
        return Err("must not start with '-'".to_string());
    }
    gix_validate::reference::name_partial(BStr::new(branch))
        .map(|_| ())
        .map_err(|err| err.to_string())
}

/// Creates and switches to a new branch.
///
/// # Errors
///
/// Returns [`VcsError::InvalidBranch`] for invalid names, or
/// [`VcsError::Command`] if git fails.
pub async fn checkout_new_branch(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    name: &str,
) -> Result<(), VcsError> {
    check_branch_name(name).map_err(|message| VcsError::InvalidBranch {
        branch: name.to_string(),
        message,
    })?;
    git(cancel, exec, "creating branch", &["checkout", "-b", name])
        .await
        .map(|_| ())
}

/// Name of the checked out branch.
///
/// # Errors
///
/// Returns [`VcsError::Command`] if git fails.
pub async fn current_branch(
    cancel: &CancellationToken,
    exec: &dyn Execer,
) -> Result<String, VcsError> {
    let stdout = git(
        cancel,
        exec,
        "reading current branch",
        &["rev-parse", "--abbrev-ref", "HEAD"],
    )
    .await?;
    Ok(stdout.trim().to_string())
}

/// Adds paths to the index.
///
/// Every path is attempted; the failures of all of them are reported
/// together.
///
/// # Errors
///
/// Returns [`VcsError::AddFiles`] if any path could not be added.
pub async fn add_files<S: AsRef<str>>(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    paths: &[S],
) -> Result<(), VcsError> {
    let mut errors = Vec::new();
    for path in paths {
        if let Err(err) = exec.run_checked(cancel, "git", &["add", path.as_ref()]).await {
            errors.push(err);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(VcsError::AddFiles(errors))
    }
}

/// Returns true if the working tree has changes.
///
/// # Errors
///
/// Returns [`VcsError::Command`] if git fails.
pub async fn has_changes(cancel: &CancellationToken, exec: &dyn Execer) -> Result<bool, VcsError> {
    let stdout = git(cancel, exec, "checking changes", &["status", "-s"]).await?;
    Ok(!stdout.trim().is_empty())
}

/// Lists the changes of the working tree.
///
/// # Errors
///
/// Returns [`VcsError::Command`] if git fails.
pub async fn list_changes(
    cancel: &CancellationToken,
    exec: &dyn Execer,
) -> Result<Vec<Change>, VcsError> {
    let stdout = git(cancel, exec, "listing changes", &["status", "-s"]).await?;
    Ok(parse_status(&stdout))
}

fn parse_status(stdout: &str) -> Vec<Change> {
    stdout
        .lines()
        .filter_map(|line| {
            let status = line.get(..2)?.trim();
            let path = line.get(3..)?;
            if status.is_empty() || path.is_empty() {
                return None;
            }
            Some(Change {
                status: status.to_string(),
                path: path.to_string(),
            })
        })
        .collect()
}

/// Commits the index with `message` and extra `git commit` flags.
///
/// # Errors
///
/// Returns [`VcsError::Command`] if git fails.
pub async fn commit<S: AsRef<str>>(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    message: &str,
    flags: &[S],
) -> Result<(), VcsError> {
    let mut args = vec!["commit", "-m", message];
    args.extend(flags.iter().map(|flag| flag.as_ref()));
    git(cancel, exec, "committing changes", &args).await.map(|_| ())
}

/// Pushes to `origin`, optionally a specific branch and with `--force`.
///
/// # Errors
///
/// Returns [`VcsError::Command`] if git fails.
pub async fn push(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    branch: Option<&str>,
    force: bool,
) -> Result<(), VcsError> {
    let mut args = vec!["push"];
    if force {
        args.push("--force");
    }
    if let Some(branch) = branch.filter(|b| !b.is_empty()) {
        args.extend(["origin", branch]);
    }
    git(cancel, exec, "pushing changes", &args).await.map(|_| ())
}

async fn git(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    action: &'static str,
    args: &[&str],
) -> Result<String, VcsError> {
    exec.run_checked(cancel, "git", args)
        .await
        .map_err(|source| VcsError::Command { action, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::{MockExecer, RecordedCall};
    use crate::exec::CommandOutput;

    #[test]
    fn validates_branch_names() {
        assert!(check_branch_name("main").is_ok());
        assert!(check_branch_name("feature/bump-deps").is_ok());
        assert!(check_branch_name("-f").is_err());
        assert!(check_branch_name("bad..name").is_err());
    }

    #[tokio::test]
    async fn checkout_rejects_invalid_names_without_running_git() {
        let mock = MockExecer::new("/repo");
        let cancel = CancellationToken::new();

        let err = checkout_new_branch(&cancel, &mock, "--orphan").await.unwrap_err();
        assert!(matches!(err, VcsError::InvalidBranch { .. }));
        assert!(mock.calls().is_empty());

        checkout_new_branch(&cancel, &mock, "bump").await.unwrap();
        assert_eq!(mock.calls()[0].command_line(), "git checkout -b bump");
    }

    #[tokio::test]
    async fn add_files_reports_every_failure() {
        let mock = MockExecer::with_handler("/repo", |call: &RecordedCall| {
            if call.args[1].starts_with("missing") {
                Ok(CommandOutput::failure(128, "pathspec did not match"))
            } else {
                Ok(CommandOutput::default())
            }
        });
        let cancel = CancellationToken::new();

        let err = add_files(&cancel, &mock, &["missing-a", "go.mod", "missing-b"])
            .await
            .unwrap_err();
        match err {
            VcsError::AddFiles(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn lists_changes() {
        let mock = MockExecer::with_handler("/repo", |_| {
            Ok(CommandOutput::success(" M go.mod\n?? notes.txt\nA  src/new.rs\n"))
        });
        let cancel = CancellationToken::new();

        assert!(has_changes(&cancel, &mock).await.unwrap());
        let changes = list_changes(&cancel, &mock).await.unwrap();
        assert_eq!(
            changes,
            vec![
                Change {
                    status: "M".to_string(),
                    path: "go.mod".to_string()
                },
                Change {
                    status: "??".to_string(),
                    path: "notes.txt".to_string()
                },
                Change {
                    status: "A".to_string(),
                    path: "src/new.rs".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn clean_tree_has_no_changes() {
        let mock = MockExecer::new("/repo");
        assert!(!has_changes(&CancellationToken::new(), &mock).await.unwrap());
    }

    #[tokio::test]
    async fn builds_commit_and_push_arguments() {
        let mock = MockExecer::new("/repo");
        let cancel = CancellationToken::new();

        commit(&cancel, &mock, "chore: bump", &["--no-verify"]).await.unwrap();
        push(&cancel, &mock, Some("bump"), true).await.unwrap();
        push(&cancel, &mock, None, false).await.unwrap();

        let calls: Vec<String> = mock.calls().iter().map(RecordedCall::command_line).collect();
        assert_eq!(
            calls,
            vec![
                "git commit -m chore: bump --no-verify",
                "git push --force origin bump",
                "git push",
            ]
        );
    }

    #[tokio::test]
    async fn reads_current_branch() {
        let mock = MockExecer::with_handler("/repo", |_| Ok(CommandOutput::success("trunk\n")));
        let branch = current_branch(&CancellationToken::new(), &mock).await.unwrap();
        assert_eq!(branch, "trunk");
    }
}
