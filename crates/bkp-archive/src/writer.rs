use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Datelike, Timelike};
use zip::write::FileOptions;
use zip::CompressionMethod;

use bkp_hash::Sha256Hasher;
use bkp_snapshot::{collect_files, snapshot_dir, snapshots_equal, FileMeta, WalkOptions};
use bkp_utils::atomic::AtomicFile;
use bkp_utils::error::{classify_io, Error};
use bkp_utils::exclude::PatternSet;
use bkp_utils::path::{ensure_dir, rel_string};
use bkp_utils::{CancelToken, Result, Scope, IO_CHUNK_SIZE};

use crate::list::latest_full_archive;
use crate::manifest::{ChecksumManifest, CHECKSUM_ENTRY_NAME};
use crate::name::{full_archive_name, incremental_archive_name, NameParts};
use crate::snapshot::snapshot_archive;
use crate::zip_error;

/// Everything the writer needs for one archive creation. The engine
/// resolves directories, reads the clock once, and queries git before
/// building the plan.
#[derive(Debug)]
pub struct ArchivePlan<'a> {
    /// Source tree root (the working directory).
    pub root: &'a Path,
    /// Fully resolved archive directory.
    pub archive_dir: &'a Path,
    pub timestamp: &'a str,
    pub prefix: Option<&'a str>,
    pub branch: Option<&'a str>,
    pub git_hash: Option<&'a str>,
    pub note: Option<&'a str>,
    pub patterns: &'a PatternSet,
    pub dry_run: bool,
    pub skip_broken_symlinks: bool,
    pub dir_mode: u32,
}

impl ArchivePlan<'_> {
    fn name_parts(&self) -> NameParts<'_> {
        NameParts {
            prefix: self.prefix,
            timestamp: self.timestamp,
            branch: self.branch,
            hash: self.git_hash,
            note: self.note,
        }
    }

    fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            skip_broken_symlinks: self.skip_broken_symlinks,
        }
    }
}

/// How an archive creation ended.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Created { path: PathBuf },
    /// The tree is byte-identical to the most recent full archive.
    Identical { existing: PathBuf },
    /// Incremental run found nothing newer than the base archive.
    NoFilesModified,
    DryRun { files: Vec<String>, target: PathBuf },
}

/// Create a full archive of the plan's root.
pub fn create_full(
    plan: &ArchivePlan,
    scope: &Scope,
    cancel: &CancelToken,
) -> Result<WriteOutcome> {
    ensure_dir(plan.archive_dir, plan.dir_mode)?;
    guard_self_inclusion(plan)?;

    let name = full_archive_name(&plan.name_parts());
    let target = plan.archive_dir.join(&name);

    if plan.dry_run {
        let files = collect_files(plan.root, plan.patterns, plan.walk_options(), cancel)?;
        return Ok(WriteOutcome::DryRun {
            files: files.into_iter().map(|f| f.rel_path).collect(),
            target,
        });
    }

    // Identity short-circuit: an unchanged tree produces no second archive.
    let fs_snap = snapshot_dir(plan.root, plan.patterns, plan.walk_options(), cancel)?;
    if let Some(latest) = latest_full_archive(plan.archive_dir)? {
        // An unreadable previous archive never blocks a new one.
        if let Ok(existing_snap) = snapshot_archive(&latest.path, cancel) {
            if snapshots_equal(&fs_snap, &existing_snap) {
                return Ok(WriteOutcome::Identical {
                    existing: latest.path,
                });
            }
        }
    }

    let files = collect_files(plan.root, plan.patterns, plan.walk_options(), cancel)?;
    let path = write_zip(&files, &target, scope, cancel)?;
    Ok(WriteOutcome::Created { path })
}

/// Create an incremental archive containing the files modified since the
/// most recent full archive.
pub fn create_incremental(
    plan: &ArchivePlan,
    scope: &Scope,
    cancel: &CancelToken,
) -> Result<WriteOutcome> {
    ensure_dir(plan.archive_dir, plan.dir_mode)?;
    guard_self_inclusion(plan)?;

    let base = latest_full_archive(plan.archive_dir)?
        .ok_or_else(|| Error::config("no full archive found"))?;
    let cutoff = base.created;

    let name = incremental_archive_name(&base.name, &plan.name_parts());
    let target = plan.archive_dir.join(&name);

    let mut files = collect_files(plan.root, plan.patterns, plan.walk_options(), cancel)?;
    // Strictly newer than the base archive; a tie stays out.
    files.retain(|f| f.modified > cutoff);

    if files.is_empty() {
        return Ok(WriteOutcome::NoFilesModified);
    }
    if plan.dry_run {
        return Ok(WriteOutcome::DryRun {
            files: files.into_iter().map(|f| f.rel_path).collect(),
            target,
        });
    }

    let path = write_zip(&files, &target, scope, cancel)?;
    Ok(WriteOutcome::Created { path })
}

/// Stream `files` into a ZIP at `target` through the atomic-publish
/// protocol. Entries appear in the given (sorted) order; each file is read
/// once, feeding the Deflate stream and the checksum manifest in one pass.
fn write_zip(
    files: &[FileMeta],
    target: &Path,
    scope: &Scope,
    cancel: &CancelToken,
) -> Result<PathBuf> {
    let mut atomic = AtomicFile::create(target, scope)?;
    let raw = atomic.take_file()?;
    let mut zip = zip::ZipWriter::new(raw);
    let mut manifest = ChecksumManifest::new();

    for file in files {
        cancel.check()?;
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(file.mode)
            .last_modified_time(zip_datetime(file.modified));
        zip.start_file(file.rel_path.clone(), options)
            .map_err(|e| zip_error(e, "unable to add archive entry", target))?;

        let hash = copy_into_zip(&file.abs_path, &mut zip, target, cancel)?;
        manifest.insert(file.rel_path.clone(), hash);
    }

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    zip.start_file(CHECKSUM_ENTRY_NAME, options)
        .map_err(|e| zip_error(e, "unable to add checksum manifest", target))?;
    zip.write_all(&manifest.to_json_bytes())
        .map_err(|e| classify_io(e, "unable to write checksum manifest", target))?;

    let raw = zip
        .finish()
        .map_err(|e| zip_error(e, "unable to finish archive", target))?;
    atomic.restore_file(raw);
    atomic.publish()
}

/// Copy one file into the open ZIP entry, hashing the bytes on the way.
fn copy_into_zip(
    source: &Path,
    zip: &mut zip::ZipWriter<File>,
    target: &Path,
    cancel: &CancelToken,
) -> Result<String> {
    let mut reader =
        File::open(source).map_err(|e| classify_io(e, "unable to open", source))?;
    let mut hasher = Sha256Hasher::new();
    let mut chunk = vec![0u8; IO_CHUNK_SIZE];
    loop {
        cancel.check()?;
        let n = reader
            .read(&mut chunk)
            .map_err(|e| classify_io(e, "unable to read", source))?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
        zip.write_all(&chunk[..n])
            .map_err(|e| classify_io(e, "unable to write archive", target))?;
    }
    Ok(hasher.finalize_hex())
}

/// Reject an archive directory that the walk would try to archive into
/// itself. An excluded directory is fine.
fn guard_self_inclusion(plan: &ArchivePlan) -> Result<()> {
    let root = std::fs::canonicalize(plan.root)
        .map_err(|e| classify_io(e, "unable to resolve directory", plan.root))?;
    let archive_dir = std::fs::canonicalize(plan.archive_dir)
        .map_err(|e| classify_io(e, "unable to resolve directory", plan.archive_dir))?;

    let Ok(rel) = archive_dir.strip_prefix(&root) else {
        return Ok(());
    };
    if rel.as_os_str().is_empty() {
        return Err(Error::config(format!(
            "archive directory {} is the directory being archived",
            archive_dir.display()
        )));
    }
    let rel = rel_string(&root, &archive_dir)?;
    if !plan.patterns.matches_dir(&rel) {
        return Err(Error::config(format!(
            "archive directory {} lies inside the directory being archived and is not excluded",
            archive_dir.display()
        )));
    }
    Ok(())
}

fn zip_datetime(t: SystemTime) -> zip::DateTime {
    let dt: chrono::DateTime<chrono::Local> = t.into();
    // The ZIP timestamp epoch starts at 1980.
    let year = dt.year().clamp(1980, 2107) as u16;
    zip::DateTime::from_date_and_time(
        year,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second().min(59) as u8,
    )
    .unwrap_or_default()
}
