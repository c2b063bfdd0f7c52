//! Local working copies of repositories.
//!
//! A working copy is either single-use (a fresh temporary directory fetched
//! for one processor call) or a private duplicate of a cache entry. Cache
//! entries live at `<root>/<owner>/<name>-<key>`, are materialized once per
//! distinct key and are never handed out directly, so processors can modify
//! their copy freely.

mod error;
mod sparse;

pub use error::WorkingCopyError;
pub use sparse::{read_lines, write_lines};

use crate::exec::Execer;
use crate::options::Options;
use crate::repository::Repository;
use crate::vcs::check_branch_name;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A materialized repository, removed from disk when dropped.
#[derive(Debug)]
pub struct WorkingCopy {
    dir: TempDir,
}

impl WorkingCopy {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the working copy, reporting failures that dropping would
    /// ignore.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the removal.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Hands out working copies below a root directory.
#[derive(Debug)]
pub struct WorkingCopies {
    root: PathBuf,
    entry_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl WorkingCopies {
    /// Creates the manager, creating `root` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`WorkingCopyError::Io`] if the root cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkingCopyError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(WorkingCopyError::io("creating base directory", &root))?;
        Ok(Self {
            root,
            entry_locks: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the cache entry for `repository` under `key`.
    #[must_use]
    pub fn entry_path(&self, repository: &Repository, key: &str) -> PathBuf {
        let (_, name) = repository.owner_and_name();
        self.owner_dir(repository)
            .join(format!("{name}-{}", sanitize(key)))
    }

    /// Returns a working copy of the repository's default branch.
    ///
    /// With a cache key from `options` the cache entry is reused (or
    /// materialized first) and duplicated; otherwise a single-use copy is
    /// fetched.
    ///
    /// # Errors
    ///
    /// Returns [`WorkingCopyError::NoDefaultBranch`] for repositories without
    /// a branch, and other [`WorkingCopyError`]s for git or filesystem
    /// failures. Nothing is left on disk for a failed materialization.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
        exec: &dyn Execer,
        repository: &Repository,
        options: &Options,
    ) -> Result<WorkingCopy, WorkingCopyError> {
        let owner_dir = self.owner_dir(repository);
        tokio::fs::create_dir_all(&owner_dir)
            .await
            .map_err(WorkingCopyError::io("creating cloning directory", &owner_dir))?;
        let (_, name) = repository.owner_and_name();

        let Some(key) = options.cache_key(repository) else {
            let dir = temp_dir_in(&owner_dir, &format!("{name}-"))?;
            materialize(cancel, exec, repository, options, dir.path()).await?;
            return Ok(WorkingCopy { dir });
        };

        let entry = self.entry_path(repository, &key);
        self.ensure_entry(cancel, exec, repository, options, &entry)
            .await?;

        let dir = temp_dir_in(&owner_dir, &format!("{name}-{}.", sanitize(&key)))?;
        let (from, to) = (entry.clone(), dir.path().to_path_buf());
        tokio::task::spawn_blocking(move || copy_tree(&from, &to))
            .await
            .map_err(io::Error::other)
            .and_then(|copied| copied)
            .map_err(WorkingCopyError::io("copying cache entry", &entry))?;

        debug!(entry = %entry.display(), path = %dir.path().display(), "Duplicated cached working copy");
        Ok(WorkingCopy { dir })
    }

    /// Removes every cache entry and working copy below the root.
    ///
    /// # Errors
    ///
    /// Returns [`WorkingCopyError::Io`] if the root cannot be cleared.
    pub async fn purge(&self) -> Result<(), WorkingCopyError> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorkingCopyError::io("removing base directory", &self.root)(e)),
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(WorkingCopyError::io("creating base directory", &self.root))
    }

    fn owner_dir(&self, repository: &Repository) -> PathBuf {
        match repository.owner_and_name() {
            ("", _) => self.root.clone(),
            (owner, _) => self.root.join(sanitize(owner)),
        }
    }

    fn entry_lock(&self, entry: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .entry_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(entry.to_path_buf()).or_default())
    }

    /// Drops the lock of an entry that exists on disk. Later callers find
    /// the directory and never need to wait.
    fn release_entry_lock(&self, entry: &Path) {
        self.entry_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entry);
    }

    async fn ensure_entry(
        &self,
        cancel: &CancellationToken,
        exec: &dyn Execer,
        repository: &Repository,
        options: &Options,
        entry: &Path,
    ) -> Result<(), WorkingCopyError> {
        let lock = self.entry_lock(entry);
        let _guard = lock.lock().await;

        let ensured = ensure_entry_locked(cancel, exec, repository, options, entry).await;
        if ensured.is_ok() {
            self.release_entry_lock(entry);
        }
        ensured
    }
}

/// Materializes `entry` unless it already exists. Callers hold its lock.
async fn ensure_entry_locked(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    repository: &Repository,
    options: &Options,
    entry: &Path,
) -> Result<(), WorkingCopyError> {
    match tokio::fs::metadata(entry).await {
        Ok(metadata) if metadata.is_dir() => {
            debug!(entry = %entry.display(), "Reusing cached working copy");
            return Ok(());
        }
        Ok(_) => {
            return Err(WorkingCopyError::NotADirectory {
                path: entry.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(WorkingCopyError::io("checking clone directory", entry)(e)),
    }

    tokio::fs::create_dir(entry)
        .await
        .map_err(WorkingCopyError::io("creating cloning directory", entry))?;

    if let Err(err) = materialize(cancel, exec, repository, options, entry).await {
        if let Err(cleanup) = tokio::fs::remove_dir_all(entry).await {
            warn!(entry = %entry.display(), error = %cleanup, "Failed to remove partial working copy");
        }
        return Err(err);
    }

    Ok(())
}

/// Initializes `dir` as a checkout of the repository's default branch.
async fn materialize(
    cancel: &CancellationToken,
    exec: &dyn Execer,
    repository: &Repository,
    options: &Options,
    dir: &Path,
) -> Result<(), WorkingCopyError> {
    debug!(repo = %repository.name, path = %dir.display(), "Materializing working copy");
    let git = exec.scoped(dir);
    let git = git.as_ref();

    run_git(cancel, git, "cloning repository", &["init", "--quiet"]).await?;

    let url = repository.clone_url(options.use_https);
    run_git(cancel, git, "adding origin", &["remote", "add", "origin", url]).await?;

    if !options.cloning_subset.is_empty() {
        run_git(
            cancel,
            git,
            "setting sparse checkout subset",
            &["config", "core.sparseCheckout", "true"],
        )
        .await?;

        let patterns = dir.join(".git").join("info").join("sparse-checkout");
        write_lines(&patterns, &options.cloning_subset)
            .await
            .map_err(WorkingCopyError::io("setting cloning subset", &patterns))?;
    }

    let branch = repository.default_branch.as_str();
    if branch.is_empty() {
        return Err(WorkingCopyError::NoDefaultBranch);
    }
    check_branch_name(branch).map_err(|message| WorkingCopyError::InvalidBranch {
        branch: branch.to_string(),
        message,
    })?;

    run_git(cancel, git, "fetching HEAD", &["fetch", "origin", branch]).await?;
    run_git(cancel, git, "checking out HEAD", &["checkout", branch]).await
}

async fn run_git(
    cancel: &CancellationToken,
    git: &dyn Execer,
    step: &'static str,
    args: &[&str],
) -> Result<(), WorkingCopyError> {
    git.run_checked(cancel, "git", args)
        .await
        .map(|_| ())
        .map_err(|source| WorkingCopyError::Git { step, source })
}

fn temp_dir_in(parent: &Path, prefix: &str) -> Result<TempDir, WorkingCopyError> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(parent)
        .map_err(WorkingCopyError::io("creating working copy in", parent))
}

/// Escapes path separators so that distinct components map to distinct
/// directory names.
fn sanitize(component: &str) -> String {
    let mut escaped = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            '\\' => escaped.push_str("%5C"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(std::fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::copy(from, to).map(|_| ())
}
