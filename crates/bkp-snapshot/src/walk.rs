use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bkp_hash::hash_file;
use bkp_utils::error::{classify_io, Error, ErrorKind};
use bkp_utils::exclude::PatternSet;
use bkp_utils::path::rel_string;
use bkp_utils::{CancelToken, Result};

use crate::entry::{sort_entries, SnapshotEntry};

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Skip symlinks whose target is missing instead of failing.
    pub skip_broken_symlinks: bool,
}

/// A regular file selected by a walk, with the metadata the archive writer
/// needs to stream it.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    pub mode: u32,
}

/// Hashed snapshot of the tree rooted at `root`, honoring the exclusion
/// set. Directories appear with `is_dir=true` and an empty hash; files are
/// hashed streaming. The result is sorted and free of duplicates.
pub fn snapshot_dir(
    root: &Path,
    patterns: &PatternSet,
    opts: WalkOptions,
    cancel: &CancelToken,
) -> Result<Vec<SnapshotEntry>> {
    let mut entries = Vec::new();
    walk(root, patterns, opts, cancel, &mut |visit| {
        match visit {
            Visit::Dir { rel } => entries.push(SnapshotEntry::dir(rel)),
            Visit::File { rel, abs, meta } => {
                let hash = hash_file(&abs, cancel)?;
                entries.push(SnapshotEntry::file(rel, meta.len(), hash));
            }
        }
        Ok(())
    })?;
    sort_entries(&mut entries);
    Ok(entries)
}

/// The regular files a walk selects, sorted by relative path. No hashing.
pub fn collect_files(
    root: &Path,
    patterns: &PatternSet,
    opts: WalkOptions,
    cancel: &CancelToken,
) -> Result<Vec<FileMeta>> {
    let mut files = Vec::new();
    walk(root, patterns, opts, cancel, &mut |visit| {
        if let Visit::File { rel, abs, meta } = visit {
            let modified = meta
                .modified()
                .map_err(|e| classify_io(e, "unable to read mtime", &abs))?;
            files.push(FileMeta {
                rel_path: rel,
                size: meta.len(),
                modified,
                mode: unix_mode(&meta),
                abs_path: abs,
            });
        }
        Ok(())
    })?;
    files.sort_unstable_by(|a, b| a.rel_path.as_bytes().cmp(b.rel_path.as_bytes()));
    Ok(files)
}

enum Visit {
    Dir {
        rel: String,
    },
    File {
        rel: String,
        abs: PathBuf,
        meta: Metadata,
    },
}

fn walk(
    root: &Path,
    patterns: &PatternSet,
    opts: WalkOptions,
    cancel: &CancelToken,
    visit: &mut impl FnMut(Visit) -> Result<()>,
) -> Result<()> {
    let meta = fs::metadata(root).map_err(|e| {
        let classified = classify_io(e, "unable to read directory", root);
        if classified.kind() == ErrorKind::FileNotFound {
            Error::new(
                ErrorKind::DirectoryNotFound,
                format!("directory not found: {}", root.display()),
            )
            .with_path(root)
        } else {
            classified
        }
    })?;
    if !meta.is_dir() {
        return Err(Error::new(
            ErrorKind::InvalidDirectory,
            format!("not a directory: {}", root.display()),
        )
        .with_path(root));
    }
    walk_dir(root, root, patterns, opts, cancel, visit)
}

fn walk_dir(
    root: &Path,
    dir: &Path,
    patterns: &PatternSet,
    opts: WalkOptions,
    cancel: &CancelToken,
    visit: &mut impl FnMut(Visit) -> Result<()>,
) -> Result<()> {
    let reader =
        fs::read_dir(dir).map_err(|e| classify_io(e, "unable to read directory", dir))?;
    for entry in reader {
        cancel.check()?;
        let entry = entry.map_err(|e| classify_io(e, "unable to read directory entry", dir))?;
        let path = entry.path();
        let rel = rel_string(root, &path)?;

        let file_type = entry
            .file_type()
            .map_err(|e| classify_io(e, "unable to stat", &path))?;

        if file_type.is_symlink() {
            // Follow only when the target is a regular file.
            match fs::metadata(&path) {
                Ok(target) if target.is_file() => {
                    if !patterns.matches(&rel) {
                        visit(Visit::File {
                            rel,
                            abs: path,
                            meta: target,
                        })?;
                    }
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if !opts.skip_broken_symlinks {
                        return Err(Error::new(
                            ErrorKind::InvalidFileType,
                            format!("broken symlink: {}", path.display()),
                        )
                        .with_path(path));
                    }
                }
                Err(e) => return Err(classify_io(e, "unable to follow symlink", &path)),
            }
            continue;
        }

        if file_type.is_dir() {
            if patterns.matches_dir(&rel) {
                continue;
            }
            visit(Visit::Dir { rel })?;
            walk_dir(root, &path, patterns, opts, cancel, visit)?;
        } else if file_type.is_file() {
            if patterns.matches(&rel) {
                continue;
            }
            let meta = entry
                .metadata()
                .map_err(|e| classify_io(e, "unable to stat", &path))?;
            visit(Visit::File {
                rel,
                abs: path,
                meta,
            })?;
        }
        // Sockets, fifos and the like are not archivable; skip.
    }
    Ok(())
}

fn unix_mode(meta: &Metadata) -> u32 {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(raw: &[&str]) -> PatternSet {
        let owned: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
        PatternSet::compile(&owned).unwrap()
    }

    fn write_tree(root: &Path) {
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("vendor/pkg")).unwrap();
        fs::write(root.join("main.rs"), b"fn main() {}").unwrap();
        fs::write(root.join("src/lib.rs"), b"pub fn lib() {}").unwrap();
        fs::write(root.join("vendor/pkg/dep.rs"), b"dep").unwrap();
        fs::write(root.join("debug.log"), b"noise").unwrap();
    }

    #[test]
    fn snapshot_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());

        let cancel = CancelToken::new();
        let snap = snapshot_dir(
            dir.path(),
            &patterns(&["vendor/", "*.log"]),
            WalkOptions::default(),
            &cancel,
        )
        .unwrap();

        let rels: Vec<&str> = snap.iter().map(|e| e.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["main.rs", "src", "src/lib.rs"]);

        let main = &snap[0];
        assert!(!main.is_dir);
        assert_eq!(main.size, 12);
        assert_eq!(main.content_hash.len(), 64);

        let src = &snap[1];
        assert!(src.is_dir);
        assert!(src.content_hash.is_empty());
    }

    #[test]
    fn snapshots_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());

        let cancel = CancelToken::new();
        let p = patterns(&["vendor/"]);
        let a = snapshot_dir(dir.path(), &p, WalkOptions::default(), &cancel).unwrap();
        let b = snapshot_dir(dir.path(), &p, WalkOptions::default(), &cancel).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn collect_files_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());

        let cancel = CancelToken::new();
        let files = collect_files(
            dir.path(),
            &patterns(&["vendor/", "*.log"]),
            WalkOptions::default(),
            &cancel,
        )
        .unwrap();

        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["main.rs", "src/lib.rs"]);
        assert!(files.iter().all(|f| f.size > 0));
    }

    #[test]
    fn missing_root_is_directory_not_found() {
        let cancel = CancelToken::new();
        let err = snapshot_dir(
            Path::new("/no/such/tree"),
            &patterns(&[]),
            WalkOptions::default(),
            &cancel,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryNotFound);
    }

    #[test]
    fn cancellation_stops_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = snapshot_dir(dir.path(), &patterns(&[]), WalkOptions::default(), &cancel)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_fails_unless_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling")).unwrap();

        let cancel = CancelToken::new();
        let err = snapshot_dir(dir.path(), &patterns(&[]), WalkOptions::default(), &cancel)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFileType);

        let snap = snapshot_dir(
            dir.path(),
            &patterns(&[]),
            WalkOptions {
                skip_broken_symlinks: true,
            },
            &cancel,
        )
        .unwrap();
        assert!(snap.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_file_is_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), b"content").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();

        let cancel = CancelToken::new();
        let snap =
            snapshot_dir(dir.path(), &patterns(&[]), WalkOptions::default(), &cancel).unwrap();
        let rels: Vec<&str> = snap.iter().map(|e| e.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["link.txt", "real.txt"]);
        assert_eq!(snap[0].content_hash, snap[1].content_hash);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real/f.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let cancel = CancelToken::new();
        let snap =
            snapshot_dir(dir.path(), &patterns(&[]), WalkOptions::default(), &cancel).unwrap();
        let rels: Vec<&str> = snap.iter().map(|e| e.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["real", "real/f.txt"]);
    }
}
