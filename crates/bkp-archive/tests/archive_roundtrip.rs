//! End-to-end archive creation, verification and identity behavior on real
//! temp trees.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::{set_file_mtime, FileTime};

use bkp_archive::writer::{create_full, create_incremental, ArchivePlan, WriteOutcome};
use bkp_archive::{snapshot_archive, verify_archive, CHECKSUM_ENTRY_NAME};
use bkp_snapshot::{snapshot_dir, snapshots_equal, WalkOptions};
use bkp_utils::exclude::PatternSet;
use bkp_utils::{CancelToken, ErrorKind, Scope};

struct Fixture {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    archive_dir: PathBuf,
    patterns: PatternSet,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("project");
        let archive_dir = tmp.path().join("archives");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("readme.md"), b"# project\n").unwrap();
        fs::write(root.join("src/main.rs"), b"fn main() {}\n").unwrap();
        fs::write(root.join("debug.log"), b"noise").unwrap();

        Self {
            _tmp: tmp,
            root,
            archive_dir,
            patterns: PatternSet::compile(&["*.log".to_string()]).unwrap(),
        }
    }

    fn plan<'a>(&'a self, timestamp: &'a str) -> ArchivePlan<'a> {
        ArchivePlan {
            root: &self.root,
            archive_dir: &self.archive_dir,
            timestamp,
            prefix: None,
            branch: None,
            git_hash: None,
            note: None,
            patterns: &self.patterns,
            dry_run: false,
            skip_broken_symlinks: false,
            dir_mode: 0o755,
        }
    }

    fn create_full_at(&self, timestamp: &str) -> PathBuf {
        let cancel = CancelToken::new();
        let scope = Scope::new();
        let outcome = create_full(&self.plan(timestamp), &scope, &cancel).unwrap();
        scope.close();
        match outcome {
            WriteOutcome::Created { path } => path,
            other => panic!("expected Created, got {other:?}"),
        }
    }
}

fn assert_no_temp_files(dir: &Path) {
    for entry in fs::read_dir(dir).unwrap() {
        let name = entry.unwrap().file_name();
        let name = name.to_string_lossy();
        assert!(!name.ends_with(".tmp"), "stray temp file: {name}");
    }
}

#[test]
fn full_archive_exists_verifies_and_leaves_no_temp() {
    let fx = Fixture::new();
    let path = fx.create_full_at("2024-03-20-15-30");

    assert_eq!(path, fx.archive_dir.join("2024-03-20-15-30.zip"));
    assert!(path.is_file());
    assert_no_temp_files(&fx.archive_dir);

    let cancel = CancelToken::new();
    let status = verify_archive(&path, "now".to_string(), &cancel).unwrap();
    assert!(status.is_verified, "errors: {:?}", status.errors);
    assert!(status.has_checksums);
}

#[test]
fn archive_round_trips_the_filesystem_snapshot() {
    let fx = Fixture::new();
    let path = fx.create_full_at("2024-03-20-15-30");

    let cancel = CancelToken::new();
    let fs_snap = snapshot_dir(&fx.root, &fx.patterns, WalkOptions::default(), &cancel).unwrap();
    let archive_snap = snapshot_archive(&path, &cancel).unwrap();

    assert!(snapshots_equal(&fs_snap, &archive_snap));
    // Excluded files stay out; directory entries are not stored.
    assert!(archive_snap.iter().all(|e| e.rel_path != "debug.log"));
    assert!(archive_snap.iter().all(|e| !e.is_dir));
}

#[test]
fn manifest_covers_every_entry() {
    let fx = Fixture::new();
    let path = fx.create_full_at("2024-03-20-15-30");

    let file = fs::File::open(&path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut names = Vec::new();
    for i in 0..zip.len() {
        names.push(zip.by_index(i).unwrap().name().to_string());
    }
    assert!(names.contains(&CHECKSUM_ENTRY_NAME.to_string()));

    let mut manifest_raw = Vec::new();
    std::io::Read::read_to_end(
        &mut zip.by_name(CHECKSUM_ENTRY_NAME).unwrap(),
        &mut manifest_raw,
    )
    .unwrap();
    let manifest = bkp_archive::ChecksumManifest::from_json_bytes(&manifest_raw).unwrap();

    for name in names.iter().filter(|n| n.as_str() != CHECKSUM_ENTRY_NAME) {
        assert!(manifest.get(name).is_some(), "not covered: {name}");
    }
    assert_eq!(manifest.len(), names.len() - 1);
}

#[test]
fn entries_are_written_in_sorted_order() {
    let fx = Fixture::new();
    fs::write(fx.root.join("aaa.txt"), b"first").unwrap();
    fs::write(fx.root.join("zzz.txt"), b"last").unwrap();
    let path = fx.create_full_at("2024-03-20-15-30");

    let file = fs::File::open(&path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut names = Vec::new();
    for i in 0..zip.len() {
        let name = zip.by_index(i).unwrap().name().to_string();
        if name != CHECKSUM_ENTRY_NAME {
            names.push(name);
        }
    }
    let mut sorted = names.clone();
    sorted.sort_unstable_by(|a: &String, b: &String| a.as_bytes().cmp(b.as_bytes()));
    assert_eq!(names, sorted);
}

#[test]
fn unchanged_tree_short_circuits_to_identical() {
    let fx = Fixture::new();
    let first = fx.create_full_at("2024-03-20-15-30");

    let cancel = CancelToken::new();
    let scope = Scope::new();
    let outcome = create_full(&fx.plan("2024-03-20-15-31"), &scope, &cancel).unwrap();
    scope.close();

    assert_eq!(
        outcome,
        WriteOutcome::Identical {
            existing: first.clone()
        }
    );
    // No second archive appeared.
    let count = fs::read_dir(&fx.archive_dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .ends_with(".zip")
        })
        .count();
    assert_eq!(count, 1);
}

#[test]
fn changed_tree_creates_a_new_archive() {
    let fx = Fixture::new();
    fx.create_full_at("2024-03-20-15-30");
    fs::write(fx.root.join("src/main.rs"), b"fn main() { run() }\n").unwrap();

    let cancel = CancelToken::new();
    let scope = Scope::new();
    let outcome = create_full(&fx.plan("2024-03-20-16-00"), &scope, &cancel).unwrap();
    scope.close();
    assert!(matches!(outcome, WriteOutcome::Created { .. }));
}

#[test]
fn dry_run_lists_files_and_writes_nothing() {
    let fx = Fixture::new();
    let mut plan = fx.plan("2024-03-20-15-30");
    plan.dry_run = true;

    let cancel = CancelToken::new();
    let scope = Scope::new();
    let outcome = create_full(&plan, &scope, &cancel).unwrap();
    scope.close();

    match outcome {
        WriteOutcome::DryRun { files, target } => {
            assert_eq!(files, vec!["readme.md", "src/main.rs"]);
            assert_eq!(target, fx.archive_dir.join("2024-03-20-15-30.zip"));
        }
        other => panic!("expected DryRun, got {other:?}"),
    }
    assert!(!fx.archive_dir.join("2024-03-20-15-30.zip").exists());
}

#[test]
fn incremental_selects_only_strictly_newer_files() {
    let fx = Fixture::new();
    let base = fx.create_full_at("2024-03-20-15-30");

    // Pin mtimes: base archive at t, x.txt strictly after, y.txt at the
    // cutoff exactly (ties stay out).
    let cutoff = FileTime::from_unix_time(1_700_000_000, 0);
    set_file_mtime(&base, cutoff).unwrap();
    fs::write(fx.root.join("x.txt"), b"new").unwrap();
    fs::write(fx.root.join("y.txt"), b"tied").unwrap();
    set_file_mtime(fx.root.join("x.txt"), FileTime::from_unix_time(1_700_000_001, 0)).unwrap();
    set_file_mtime(fx.root.join("y.txt"), cutoff).unwrap();
    set_file_mtime(fx.root.join("readme.md"), FileTime::from_unix_time(1_600_000_000, 0))
        .unwrap();
    set_file_mtime(
        fx.root.join("src/main.rs"),
        FileTime::from_unix_time(1_600_000_000, 0),
    )
    .unwrap();

    let cancel = CancelToken::new();
    let scope = Scope::new();
    let outcome = create_incremental(&fx.plan("2024-03-21-09-00"), &scope, &cancel).unwrap();
    scope.close();

    let path = match outcome {
        WriteOutcome::Created { path } => path,
        other => panic!("expected Created, got {other:?}"),
    };
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "2024-03-20-15-30_update=2024-03-21-09-00.zip"
    );

    let snap = snapshot_archive(&path, &cancel).unwrap();
    let rels: Vec<&str> = snap.iter().map(|e| e.rel_path.as_str()).collect();
    assert_eq!(rels, vec!["x.txt"]);

    let status = verify_archive(&path, "now".to_string(), &cancel).unwrap();
    assert!(status.is_verified);
}

#[test]
fn incremental_without_changes_writes_nothing() {
    let fx = Fixture::new();
    let base = fx.create_full_at("2024-03-20-15-30");

    // Move the cutoff past every file mtime.
    let future = FileTime::from_unix_time(4_000_000_000, 0);
    set_file_mtime(&base, future).unwrap();

    let cancel = CancelToken::new();
    let scope = Scope::new();
    let outcome = create_incremental(&fx.plan("2024-03-21-09-00"), &scope, &cancel).unwrap();
    scope.close();

    assert_eq!(outcome, WriteOutcome::NoFilesModified);
    assert_no_temp_files(&fx.archive_dir);
    let zips = fs::read_dir(&fx.archive_dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .ends_with(".zip")
        })
        .count();
    assert_eq!(zips, 1);
}

#[test]
fn incremental_requires_a_full_archive() {
    let fx = Fixture::new();
    let cancel = CancelToken::new();
    let scope = Scope::new();
    let err = create_incremental(&fx.plan("2024-03-21-09-00"), &scope, &cancel).unwrap_err();
    scope.close();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.message().contains("no full archive"));
}

#[test]
fn cancellation_before_write_leaves_prior_state() {
    let fx = Fixture::new();
    let cancel = CancelToken::new();
    cancel.cancel();

    let scope = Scope::new();
    let err = create_full(&fx.plan("2024-03-20-15-30"), &scope, &cancel).unwrap_err();
    scope.close();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!fx.archive_dir.join("2024-03-20-15-30.zip").exists());
    assert_no_temp_files(&fx.archive_dir);
}

#[test]
fn archive_dir_inside_root_must_be_excluded() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("project");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("f.txt"), b"x").unwrap();
    let inside = root.join("archives");

    let patterns = PatternSet::compile(&[]).unwrap();
    let plan = ArchivePlan {
        root: &root,
        archive_dir: &inside,
        timestamp: "2024-03-20-15-30",
        prefix: None,
        branch: None,
        git_hash: None,
        note: None,
        patterns: &patterns,
        dry_run: false,
        skip_broken_symlinks: false,
        dir_mode: 0o755,
    };

    let cancel = CancelToken::new();
    let scope = Scope::new();
    let err = create_full(&plan, &scope, &cancel).unwrap_err();
    scope.close();
    assert_eq!(err.kind(), ErrorKind::Config);

    // With the directory excluded the same layout is fine.
    let patterns = PatternSet::compile(&["archives/".to_string()]).unwrap();
    let plan = ArchivePlan { patterns: &patterns, ..plan };
    let scope = Scope::new();
    let outcome = create_full(&plan, &scope, &cancel).unwrap();
    scope.close();
    assert!(matches!(outcome, WriteOutcome::Created { .. }));
}

#[test]
fn git_tokens_and_note_flow_into_the_name() {
    let fx = Fixture::new();
    let mut plan = fx.plan("2024-03-20-15-30");
    plan.branch = Some("main");
    plan.git_hash = Some("abcd123");
    plan.note = Some("rc1");

    let cancel = CancelToken::new();
    let scope = Scope::new();
    let outcome = create_full(&plan, &scope, &cancel).unwrap();
    scope.close();

    match outcome {
        WriteOutcome::Created { path } => {
            assert_eq!(
                path.file_name().unwrap().to_str().unwrap(),
                "2024-03-20-15-30=main=abcd123=rc1.zip"
            );
        }
        other => panic!("expected Created, got {other:?}"),
    }
}
