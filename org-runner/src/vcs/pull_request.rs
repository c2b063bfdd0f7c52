//! Pull request creation through `gh pr`.

use super::VcsError;
use crate::exec::{command_line, Execer};
use serde::Deserialize;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Longest pull request body sent to GitHub, in characters.
pub const PR_BODY_MAX_LEN: usize = 5000;

/// What to open a pull request with.
#[derive(Debug, Clone, Default)]
pub struct PrOptions {
    pub title: String,
    /// Markdown body. Truncated to [`PR_BODY_MAX_LEN`] characters.
    pub body: String,
    /// Pass `--dry-run` to `gh pr create`.
    pub dry_run: bool,
    pub draft: bool,
}

#[derive(Debug, Deserialize)]
struct ExistingPr {
    url: String,
    state: String,
}

/// Opens a pull request for the current branch unless one is already open,
/// returning its URL.
///
/// A closed pull request does not count; a new one is created instead.
///
/// # Errors
///
/// Returns [`VcsError`] if the body cannot be written, `gh` cannot be run or
/// it prints an unexpected answer.
pub async fn create_pr_if_not_exist(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    options: &PrOptions,
) -> Result<String, VcsError> {
    let body_file = if options.body.is_empty() {
        None
    } else {
        let mut file = tempfile::Builder::new()
            .prefix("pr-body")
            .tempfile()
            .map_err(VcsError::BodyFile)?;
        file.write_all(truncate_chars(&options.body, PR_BODY_MAX_LEN).as_bytes())
            .and_then(|()| file.flush())
            .map_err(VcsError::BodyFile)?;
        Some(file)
    };

    let view_args = ["pr", "view", "--json", "url,state"];
    let view = exec
        .run(cancel, "gh", &view_args)
        .await
        .map_err(|source| VcsError::Command {
            action: "checking existing PR",
            source,
        })?;
    if view.is_success() {
        let existing: ExistingPr =
            serde_json::from_str(view.trim_stdout()).map_err(VcsError::ExistingPr)?;
        if existing.state != "CLOSED" {
            debug!(url = %existing.url, "Reusing existing PR");
            return Ok(existing.url);
        }
    }

    let body_path = body_file
        .as_ref()
        .map(|file| file.path().to_string_lossy().into_owned());
    let mut args = vec!["pr", "create"];
    if let Some(path) = &body_path {
        args.extend(["--body-file", path.as_str()]);
    }
    if options.draft {
        args.push("--draft");
    }
    if !options.title.is_empty() {
        args.extend(["--title", options.title.as_str()]);
    }
    if options.dry_run {
        args.push("--dry-run");
    }

    let created = exec
        .run(cancel, "gh", &args)
        .await
        .and_then(|output| output.into_checked(command_line("gh", &args)))
        .map_err(|source| VcsError::Command {
            action: "creating PR",
            source,
        })?;

    Ok(created.trim().to_string())
}

fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices()
        .nth(max)
        .map_or(text, |(index, _)| &text[..index])
}
