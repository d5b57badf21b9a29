//! Read-only git metadata, injected into the engine as a capability.
//!
//! The engine never aborts an archive because git misbehaved: every failure
//! here degrades to absent data.

use std::path::Path;
use std::process::{Command, Stdio};

/// What the capability learned about a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitInfo {
    pub is_repo: bool,
    pub branch: Option<String>,
    pub short_hash: Option<String>,
    pub is_clean: Option<bool>,
}

impl GitInfo {
    /// Branch and hash tokens for archive naming, present only when both
    /// are known and non-empty.
    pub fn name_tokens(&self) -> Option<(&str, &str)> {
        if !self.is_repo {
            return None;
        }
        match (self.branch.as_deref(), self.short_hash.as_deref()) {
            (Some(branch), Some(hash)) if !branch.is_empty() && !hash.is_empty() => {
                Some((branch, hash))
            }
            _ => None,
        }
    }
}

pub trait GitCapability {
    fn info(&self, dir: &Path) -> GitInfo;
}

/// Production capability: shells out to the `git` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubprocessGit;

impl GitCapability for SubprocessGit {
    fn info(&self, dir: &Path) -> GitInfo {
        if !matches!(
            run_git(dir, &["rev-parse", "--is-inside-work-tree"]).as_deref(),
            Some("true")
        ) {
            return GitInfo::default();
        }

        let branch = run_git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]);
        let short_hash = run_git(dir, &["rev-parse", "--short", "HEAD"]);
        let is_clean = run_git(dir, &["status", "--porcelain"]).map(|out| out.is_empty());

        GitInfo {
            is_repo: true,
            branch: branch.filter(|b| !b.is_empty()),
            short_hash: short_hash.filter(|h| !h.is_empty()),
            is_clean,
        }
    }
}

/// Test double: nothing is ever a repository.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGit;

impl GitCapability for NoGit {
    fn info(&self, _dir: &Path) -> GitInfo {
        GitInfo::default()
    }
}

/// Run `git <args>` in `dir`, returning trimmed stdout on success and None
/// on any failure (missing binary, non-zero exit, undecodable output).
fn run_git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}
