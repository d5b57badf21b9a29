use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use bkp_archive::backup_name;
use bkp_config::Config;
use bkp_snapshot::files_identical;
use bkp_utils::atomic::AtomicFile;
use bkp_utils::error::{classify_io, Error, ErrorKind};
use bkp_utils::path::{ensure_dir, file_name, rel_string, resolve_from, set_mode};
use bkp_utils::{CancelToken, Result, Scope, IO_CHUNK_SIZE};

use crate::event::{Event, EventSink};

/// Single-file backup: validate, detect identity against the most recent
/// prior backup, then atomically copy with the source's mode preserved.
///
/// Returns the identical-backup sentinel as an `Err` so the engine can map
/// it to its dedicated status code; it is the one non-error early exit with
/// a non-zero status.
#[allow(clippy::too_many_arguments)]
pub fn backup_file(
    cfg: &Config,
    root: &Path,
    file: &Path,
    timestamp: &str,
    note: Option<&str>,
    dry_run: bool,
    events: &dyn EventSink,
    scope: &Scope,
    cancel: &CancelToken,
) -> Result<i32> {
    let source = if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    };

    let meta = std::fs::metadata(&source)
        .map_err(|e| classify_io(e, "unable to back up", &source))?;
    if !meta.is_file() {
        return Err(Error::new(
            ErrorKind::InvalidFileType,
            format!("not a regular file: {}", source.display()),
        )
        .with_path(&source));
    }

    let backup_dir = backup_dir_for(cfg, root, &source);
    let source_name = file_name(&source)?;
    let name = backup_name(source_name, timestamp, note);
    let backup_path = backup_dir.join(&name);

    if dry_run {
        events.emit(Event::DryRunList {
            files: vec![source.display().to_string()],
            target: backup_path,
        });
        return Ok(0);
    }

    if let Some(existing) = most_recent_backup(&backup_dir, source_name)? {
        if files_identical(&source, &existing, cancel)? {
            return Err(Error::identical_to_existing(existing));
        }
    }

    ensure_dir(&backup_dir, cfg.dir_permissions)?;
    let published = copy_atomic(&source, &backup_path, mode_of(&meta), scope, cancel)?;
    debug!(backup = %published.display(), "published backup");
    events.emit(Event::CreatedBackup { path: published });
    Ok(0)
}

/// `<backup_dir>` or `<backup_dir>/<dirname(rel(file))>` when per-directory
/// nesting is enabled.
fn backup_dir_for(cfg: &Config, root: &Path, source: &Path) -> PathBuf {
    let mut dir = resolve_from(root, &cfg.backup_dir_path);
    if cfg.use_current_dir_name_for_files {
        if let Ok(rel) = rel_string(root, source) {
            if let Some((parent, _)) = rel.rsplit_once('/') {
                dir.push(parent);
            }
        }
    }
    dir
}

/// Newest prior backup of the same source file, by mtime.
fn most_recent_backup(backup_dir: &Path, source_name: &str) -> Result<Option<PathBuf>> {
    let reader = match std::fs::read_dir(backup_dir) {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(classify_io(e, "unable to read backup directory", backup_dir)),
    };

    let prefix = format!("{source_name}-");
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in reader {
        let entry =
            entry.map_err(|e| classify_io(e, "unable to read backup directory", backup_dir))?;
        let entry_name = entry.file_name();
        let Some(entry_name) = entry_name.to_str() else {
            continue;
        };
        if !entry_name.starts_with(&prefix) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let modified = meta
            .modified()
            .map_err(|e| classify_io(e, "unable to read mtime", entry.path()))?;
        if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
            newest = Some((modified, entry.path()));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Stream-copy through the atomic-publish protocol, preserving the source
/// mode on the published file.
fn copy_atomic(
    source: &Path,
    target: &Path,
    mode: u32,
    scope: &Scope,
    cancel: &CancelToken,
) -> Result<PathBuf> {
    let mut reader = File::open(source).map_err(|e| classify_io(e, "unable to open", source))?;
    let mut atomic = AtomicFile::create(target, scope)?;

    let mut chunk = vec![0u8; IO_CHUNK_SIZE];
    loop {
        cancel.check()?;
        let n = reader
            .read(&mut chunk)
            .map_err(|e| classify_io(e, "unable to read", source))?;
        if n == 0 {
            break;
        }
        atomic
            .file_mut()?
            .write_all(&chunk[..n])
            .map_err(|e| classify_io(e, "unable to write backup", target))?;
    }

    set_mode(atomic.tmp_path(), mode)?;
    atomic.publish()
}

fn mode_of(meta: &std::fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o777
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        0o644
    }
}
