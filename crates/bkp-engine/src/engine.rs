use std::path::{Path, PathBuf};

use tracing::debug;

use bkp_archive::writer::{create_full, create_incremental, ArchivePlan, WriteOutcome};
use bkp_archive::{
    latest_archive, list_archives, parse_archive_name, verify::persist_status, verify_archive,
};
use bkp_config::Config;
use bkp_git::{GitCapability, GitInfo};
use bkp_utils::error::classify_io;
use bkp_utils::exclude::PatternSet;
use bkp_utils::path::{dir_basename, resolve_from};
use bkp_utils::timestamp::{archive_timestamp, rfc3339, Clock};
use bkp_utils::{CancelToken, Error, ErrorKind, Result, Scope};

use crate::event::{Event, EventSink};

/// One engine per command invocation. Owns nothing long-lived: the
/// configuration is borrowed, the clock is read once, and every transient
/// resource lives in a scope that dies with the call.
pub struct Engine<'a> {
    cfg: &'a Config,
    root: PathBuf,
    patterns: PatternSet,
    git: &'a dyn GitCapability,
    events: &'a dyn EventSink,
    clock: &'a dyn Clock,
    cancel: CancelToken,
}

impl<'a> std::fmt::Debug for Engine<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("root", &self.root)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl<'a> Engine<'a> {
    /// Validate the configuration and compile its exclusion patterns.
    /// Failures here surface as a non-zero status at startup.
    pub fn new(
        cfg: &'a Config,
        root: PathBuf,
        git: &'a dyn GitCapability,
        events: &'a dyn EventSink,
        clock: &'a dyn Clock,
        cancel: CancelToken,
    ) -> Result<Self> {
        cfg.validate()?;
        let patterns = PatternSet::compile(&cfg.exclude_patterns)?;
        Ok(Self {
            cfg,
            root,
            patterns,
            git,
            events,
            clock,
            cancel,
        })
    }

    /// Create a full archive of the working directory.
    pub fn full(&self, note: Option<&str>, dry_run: bool, verify: bool) -> i32 {
        self.finish(self.run_full(note, dry_run, verify))
    }

    /// Create an incremental archive against the latest full archive.
    pub fn incremental(&self, note: Option<&str>, dry_run: bool, verify: bool) -> i32 {
        self.finish(self.run_incremental(note, dry_run, verify))
    }

    /// Back up one file into the backup directory.
    pub fn backup_file(&self, file: &Path, note: Option<&str>, dry_run: bool) -> i32 {
        self.finish(self.run_backup(file, note, dry_run))
    }

    /// Verify an archive by name, or the most recent one.
    pub fn verify(&self, archive_name: Option<&str>) -> i32 {
        self.finish(self.run_verify(archive_name))
    }

    /// Enumerate archives with their verification state.
    pub fn list(&self) -> i32 {
        self.finish(self.run_list())
    }

    fn finish(&self, result: Result<i32>) -> i32 {
        match result {
            Ok(code) => code,
            Err(err) => {
                match err.kind() {
                    // Not a failure: the backup identity exit.
                    ErrorKind::IdenticalToExisting => {
                        if let Some(existing) = err.path() {
                            self.events.emit(Event::IdenticalBackup {
                                existing: existing.to_path_buf(),
                            });
                        }
                    }
                    // Already reported through VerificationFailed.
                    ErrorKind::VerificationFailed => {}
                    kind => {
                        self.events.emit(Event::Error {
                            kind,
                            message: err.to_string(),
                        });
                    }
                }
                self.cfg.status_codes.code_for(err.kind())
            }
        }
    }

    fn run_full(&self, note: Option<&str>, dry_run: bool, verify: bool) -> Result<i32> {
        let timestamp = archive_timestamp(self.clock.now());
        let git = self.git_info();
        let (branch, hash) = self.git_tokens(&git);
        let archive_dir = self.archive_dir();
        let prefix = self.prefix();

        let plan = ArchivePlan {
            root: &self.root,
            archive_dir: &archive_dir,
            timestamp: &timestamp,
            prefix: prefix.as_deref(),
            branch: branch.as_deref(),
            git_hash: hash.as_deref(),
            note,
            patterns: &self.patterns,
            dry_run,
            skip_broken_symlinks: self.cfg.skip_broken_symlinks,
            dir_mode: self.cfg.dir_permissions,
        };

        Scope::run_guarded(|scope| {
            match create_full(&plan, scope, &self.cancel)? {
                WriteOutcome::Created { path } => {
                    debug!(archive = %path.display(), "published full archive");
                    self.events.emit(Event::CreatedArchive {
                        path: path.clone(),
                        git: branch.clone().zip(hash.clone()),
                        note: note.map(|n| n.to_string()),
                    });
                    if verify || self.cfg.verification.verify_on_create {
                        self.verify_created(&archive_dir, &path, scope)?;
                    }
                    Ok(self.cfg.status_codes.status_created_archive)
                }
                WriteOutcome::Identical { existing } => {
                    self.events.emit(Event::IdenticalArchive { existing });
                    Ok(self.cfg.status_codes.status_created_archive)
                }
                WriteOutcome::DryRun { files, target } => {
                    self.events.emit(Event::DryRunList { files, target });
                    Ok(0)
                }
                WriteOutcome::NoFilesModified => Ok(0),
            }
        })
    }

    fn run_incremental(&self, note: Option<&str>, dry_run: bool, verify: bool) -> Result<i32> {
        let timestamp = archive_timestamp(self.clock.now());
        let git = self.git_info();
        let (branch, hash) = self.git_tokens(&git);
        let archive_dir = self.archive_dir();

        let plan = ArchivePlan {
            root: &self.root,
            archive_dir: &archive_dir,
            timestamp: &timestamp,
            prefix: None,
            branch: branch.as_deref(),
            git_hash: hash.as_deref(),
            note,
            patterns: &self.patterns,
            dry_run,
            skip_broken_symlinks: self.cfg.skip_broken_symlinks,
            dir_mode: self.cfg.dir_permissions,
        };

        Scope::run_guarded(|scope| {
            match create_incremental(&plan, scope, &self.cancel)? {
                WriteOutcome::Created { path } => {
                    debug!(archive = %path.display(), "published incremental archive");
                    let name = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or_default();
                    let base = parse_archive_name(name).base_archive.unwrap_or_default();
                    self.events.emit(Event::CreatedIncrementalArchive {
                        path: path.clone(),
                        base,
                    });
                    if verify || self.cfg.verification.verify_on_create {
                        self.verify_created(&archive_dir, &path, scope)?;
                    }
                    Ok(self.cfg.status_codes.status_created_archive)
                }
                WriteOutcome::NoFilesModified => {
                    self.events.emit(Event::NoFilesModified);
                    Ok(0)
                }
                WriteOutcome::DryRun { files, target } => {
                    self.events.emit(Event::DryRunList { files, target });
                    Ok(0)
                }
                WriteOutcome::Identical { .. } => Ok(0),
            }
        })
    }

    fn run_backup(&self, file: &Path, note: Option<&str>, dry_run: bool) -> Result<i32> {
        let timestamp = archive_timestamp(self.clock.now());
        Scope::run_guarded(|scope| {
            crate::backup::backup_file(
                self.cfg,
                &self.root,
                file,
                &timestamp,
                note,
                dry_run,
                self.events,
                scope,
                &self.cancel,
            )
        })
    }

    fn run_verify(&self, archive_name: Option<&str>) -> Result<i32> {
        let archive_dir = self.archive_dir();
        let (name, path) = match archive_name {
            Some(name) => (name.to_string(), archive_dir.join(name)),
            None => {
                let latest = latest_archive(&archive_dir)?
                    .ok_or_else(|| Error::config("no archives found"))?;
                (latest.name, latest.path)
            }
        };

        let status = verify_archive(&path, rfc3339(self.clock.now()), &self.cancel)?;
        Scope::run_guarded(|scope| {
            persist_status(&archive_dir, &name, &status, self.cfg.dir_permissions, scope)
        })?;

        if status.is_verified {
            self.events.emit(Event::Verified { archive: path });
            Ok(0)
        } else {
            self.events.emit(Event::VerificationFailed {
                archive: path,
                errors: status.errors.clone(),
            });
            Err(Error::verification_failed(status.errors.join("; ")))
        }
    }

    fn run_list(&self) -> Result<i32> {
        let archives = list_archives(&self.archive_dir(), self.cfg.dir_permissions)?;
        self.events.emit(Event::ListArchives { archives });
        Ok(0)
    }

    /// Post-creation verification: a failing archive is removed before the
    /// error propagates; a passing one gets its sidecar persisted.
    fn verify_created(&self, archive_dir: &Path, path: &Path, scope: &Scope) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let status = verify_archive(path, rfc3339(self.clock.now()), &self.cancel)?;
        if status.is_verified {
            persist_status(archive_dir, &name, &status, self.cfg.dir_permissions, scope)?;
            self.events.emit(Event::Verified {
                archive: path.to_path_buf(),
            });
            Ok(())
        } else {
            std::fs::remove_file(path)
                .map_err(|e| classify_io(e, "unable to remove failed archive", path))?;
            self.events.emit(Event::VerificationFailed {
                archive: path.to_path_buf(),
                errors: status.errors.clone(),
            });
            Err(Error::verification_failed(status.errors.join("; ")))
        }
    }

    fn git_info(&self) -> GitInfo {
        if self.cfg.include_git_info {
            self.git.info(&self.root)
        } else {
            GitInfo::default()
        }
    }

    /// Branch and hash tokens for naming, with the dirty suffix applied
    /// when configured.
    fn git_tokens(&self, info: &GitInfo) -> (Option<String>, Option<String>) {
        let Some((branch, hash)) = info.name_tokens() else {
            return (None, None);
        };
        let hash = if self.cfg.show_git_dirty_status && info.is_clean == Some(false) {
            format!("{hash}-dirty")
        } else {
            hash.to_string()
        };
        (Some(branch.to_string()), Some(hash))
    }

    fn archive_dir(&self) -> PathBuf {
        let mut dir = resolve_from(&self.root, &self.cfg.archive_dir_path);
        if self.cfg.use_current_dir_name {
            if let Some(basename) = dir_basename(&self.root) {
                dir.push(basename);
            }
        }
        dir
    }

    fn prefix(&self) -> Option<String> {
        if self.cfg.use_current_dir_name {
            None
        } else {
            dir_basename(&self.root)
        }
    }
}
