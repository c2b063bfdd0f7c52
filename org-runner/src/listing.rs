//! Repository listing through the `gh api` command.
//!
//! The GitHub CLI takes care of authentication, pagination and response
//! caching. Its `--jq` projection trims every repository down to the fields
//! of [`Repository`] and, with `--paginate`, prints one JSON array per page,
//! which is exactly the format [`decode_pages`] consumes.

use crate::exec::{command_line, ExecError, Execer};
use crate::pages::{decode_pages, decode_repository, DecodeError};
use crate::repository::Repository;
use crate::search::Paging;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// REST API version requested from GitHub.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

const FIELDS: &str =
    "{full_name, clone_url, ssh_url, default_branch, archived, language, visibility, fork, size}";

/// Errors that can occur while listing repositories.
#[derive(Debug, Error)]
pub enum ListingError {
    /// GitHub answered with an error message.
    #[error("fetching {target}: {message}")]
    Api { target: String, message: String },

    /// The listing command failed without an API message.
    #[error("fetching {target}: {source}")]
    Command {
        target: String,
        #[source]
        source: ExecError,
    },

    /// The listing output could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ListingError {
    /// Returns true if the listing command was killed by cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Command {
                source: ExecError::Cancelled { .. },
                ..
            }
        )
    }
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

/// Lists the repositories of an organization, one vector per page.
///
/// # Errors
///
/// Returns [`ListingError`] if the command fails or its output is malformed.
pub async fn list_organization(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    program: &str,
    org: &str,
    paging: Paging,
    cache: Option<Duration>,
) -> Result<Vec<Vec<Repository>>, ListingError> {
    let mut target = format!("/orgs/{org}/repos?per_page={}", paging.per_page);
    if let Some(page) = paging.page {
        target.push_str(&format!("&page={page}"));
    }

    let projection = format!(". | map({FIELDS})");
    let args = api_args(&projection, cache, paging.all_pages, &target);
    let stdout = gh_api(cancel, exec, program, &args, &target).await?;

    Ok(decode_pages(&stdout)?)
}

/// Looks up a single repository by its `owner/name`.
///
/// # Errors
///
/// Returns [`ListingError`] if the command fails or its output is malformed.
pub async fn fetch_repository(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    program: &str,
    name: &str,
) -> Result<Repository, ListingError> {
    let target = format!("/repos/{name}");
    let args = api_args(FIELDS, None, false, &target);
    let stdout = gh_api(cancel, exec, program, &args, &target).await?;

    Ok(decode_repository(&stdout)?)
}

fn api_args(projection: &str, cache: Option<Duration>, paginate: bool, target: &str) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "api".into(),
        "-H".into(),
        "Accept: application/vnd.github+json".into(),
        "-H".into(),
        format!("X-GitHub-Api-Version: {GITHUB_API_VERSION}"),
        "-X".into(),
        "GET".into(),
        "--jq".into(),
        projection.into(),
    ];
    if let Some(ttl) = cache.and_then(cache_ttl) {
        args.push("--cache".into());
        args.push(ttl);
    }
    if paginate {
        args.push("--paginate".into());
    }
    args.push(target.into());
    args
}

/// Formats a cache duration for `gh`, rounding sub-second parts up. A zero
/// duration disables the cache.
fn cache_ttl(cache: Duration) -> Option<String> {
    if cache.is_zero() {
        return None;
    }
    let secs = cache.as_secs() + u64::from(cache.subsec_nanos() > 0);
    Some(format!("{secs}s"))
}

async fn gh_api(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    program: &str,
    args: &[String],
    target: &str,
) -> Result<String, ListingError> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    debug!(endpoint = %target, "Fetching from GitHub");

    let output = exec
        .run(cancel, program, &args)
        .await
        .map_err(|source| ListingError::Command {
            target: target.to_string(),
            source,
        })?;

    if !output.cancelled && output.exit_code != 0 {
        if let Some(message) = api_message(&output.stdout) {
            return Err(ListingError::Api {
                target: target.to_string(),
                message,
            });
        }
    }

    output
        .into_checked(command_line(program, &args))
        .map_err(|source| ListingError::Command {
            target: target.to_string(),
            source,
        })
}

fn api_message(stdout: &str) -> Option<String> {
    serde_json::from_str::<ApiMessage>(stdout.trim())
        .ok()
        .map(|body| body.message)
        .filter(|message| !message.is_empty())
}
