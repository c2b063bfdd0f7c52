//! Working copies materialized by a real `git` from a local repository.

use std::path::Path;
use std::process::Command;

use org_runner::working_copy::read_lines;
use org_runner::{
    clone_cache_key_from_string, CommandExecer, Options, Repository, WorkingCopies,
};
use tokio_util::sync::CancellationToken;

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

/// Creates a repository with one commit on `trunk`.
fn source_repository(dir: &Path) -> Repository {
    git(dir, &["init", "--quiet"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/trunk"]);
    git(dir, &["config", "user.email", "runner@example.com"]);
    git(dir, &["config", "user.name", "Runner"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    std::fs::write(dir.join("README.md"), "# widgets\n").unwrap();
    std::fs::create_dir(dir.join("docs")).unwrap();
    std::fs::write(dir.join("docs/guide.md"), "guide\n").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "--quiet", "-m", "initial"]);

    Repository {
        name: "local/widgets".to_string(),
        url: dir.to_string_lossy().into_owned(),
        default_branch: "trunk".to_string(),
        size: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn cached_checkout_is_duplicated_per_acquisition() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }

    let source = tempfile::tempdir().unwrap();
    let repository = source_repository(source.path());
    let cache = tempfile::tempdir().unwrap();
    let copies = WorkingCopies::new(cache.path()).unwrap();
    let exec = CommandExecer::default();
    let cancel = CancellationToken::new();
    let options = Options {
        use_https: true,
        clone_cache_key: Some(clone_cache_key_from_string("v1")),
        ..Default::default()
    };

    let first = copies
        .acquire(&cancel, &exec, &repository, &options)
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(first.path().join("README.md")).unwrap(),
        "# widgets\n"
    );

    // The cache entry must serve later acquisitions without the origin.
    let moved = tempfile::tempdir().unwrap();
    let unreachable = moved.path().join("gone");
    std::fs::rename(source.path(), &unreachable).unwrap();

    let second = copies
        .acquire(&cancel, &exec, &repository, &options)
        .await
        .unwrap();
    assert_ne!(first.path(), second.path());

    std::fs::write(first.path().join("README.md"), "changed\n").unwrap();
    assert_eq!(
        std::fs::read_to_string(second.path().join("README.md")).unwrap(),
        "# widgets\n"
    );

    let first_path = first.path().to_path_buf();
    first.close().unwrap();
    assert!(!first_path.exists());
    assert!(second.path().join("docs/guide.md").exists());

    std::fs::rename(&unreachable, source.path()).unwrap();
}

#[tokio::test]
async fn sparse_checkout_limits_the_working_tree() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }

    let source = tempfile::tempdir().unwrap();
    let repository = source_repository(source.path());
    let cache = tempfile::tempdir().unwrap();
    let copies = WorkingCopies::new(cache.path()).unwrap();
    let options = Options {
        use_https: true,
        cloning_subset: vec!["/README.md".to_string()],
        ..Default::default()
    };

    let copy = copies
        .acquire(
            &CancellationToken::new(),
            &CommandExecer::default(),
            &repository,
            &options,
        )
        .await
        .unwrap();

    assert!(copy.path().join("README.md").exists());
    assert!(!copy.path().join("docs/guide.md").exists());
    assert_eq!(
        read_lines(&copy.path().join(".git/info/sparse-checkout"))
            .await
            .unwrap(),
        vec!["/README.md".to_string()]
    );
}
