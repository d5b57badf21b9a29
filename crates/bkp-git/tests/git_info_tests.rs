//! Exercises the subprocess capability against a real `git` binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use bkp_git::{GitCapability, SubprocessGit};

/// Create a temporary git repository with one commit on `main`.
fn setup_repo() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let work_tree = std::fs::canonicalize(dir.path()).unwrap();

    let run = |args: &[&str]| {
        Command::new("git")
            .args(args)
            .current_dir(&work_tree)
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .unwrap()
    };

    assert!(run(&["init", "-b", "main"]).success());
    assert!(run(&["commit", "--allow-empty", "-m", "initial"]).success());

    (dir, work_tree)
}

#[test]
fn reports_branch_hash_and_clean_state() {
    let (_dir, work_tree) = setup_repo();
    let info = SubprocessGit.info(&work_tree);

    assert!(info.is_repo);
    assert_eq!(info.branch.as_deref(), Some("main"));
    let hash = info.short_hash.as_deref().unwrap();
    assert!(hash.len() >= 4, "short hash too short: {hash}");
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(info.is_clean, Some(true));

    let (branch, token_hash) = info.name_tokens().unwrap();
    assert_eq!(branch, "main");
    assert_eq!(token_hash, hash);
}

#[test]
fn dirty_work_tree_is_reported() {
    let (_dir, work_tree) = setup_repo();
    std::fs::write(work_tree.join("untracked.txt"), b"changes").unwrap();

    let info = SubprocessGit.info(&work_tree);
    assert_eq!(info.is_clean, Some(false));
}

#[test]
fn plain_directory_is_not_a_repo() {
    // Use the filesystem root so no parent repository is discovered.
    let info = SubprocessGit.info(Path::new("/"));
    assert!(!info.is_repo);
}
