use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bkp_utils::error::classify_io;
use bkp_utils::path::ensure_dir;
use bkp_utils::Result;

use crate::name::parse_archive_name;
use crate::verify::{load_status, VerificationStatus};
use crate::{ARCHIVE_EXT, UPDATE_MARKER};

/// A published archive as seen on disk.
#[derive(Debug, Clone)]
pub struct Archive {
    pub name: String,
    pub path: PathBuf,
    /// File mtime; archives are immutable so this is the creation time.
    pub created: SystemTime,
    pub is_incremental: bool,
    pub base_archive: Option<String>,
    pub branch: Option<String>,
    pub git_hash: Option<String>,
    pub note: Option<String>,
    pub verification: Option<VerificationStatus>,
}

/// All archives in `dir`, sorted by name, with verification sidecars
/// attached. A missing directory is created on demand.
pub fn list_archives(dir: &Path, dir_mode: u32) -> Result<Vec<Archive>> {
    ensure_dir(dir, dir_mode)?;
    let mut archives = scan(dir)?;
    for archive in &mut archives {
        archive.verification = load_status(dir, &archive.name);
    }
    archives.sort_unstable_by(|a, b| a.name.cmp(&b.name));
    Ok(archives)
}

/// The newest archive by mtime, full or incremental.
pub fn latest_archive(dir: &Path) -> Result<Option<Archive>> {
    let archives = scan(dir)?;
    Ok(archives.into_iter().max_by_key(|a| a.created))
}

/// The newest full archive by mtime; incrementals do not qualify.
pub fn latest_full_archive(dir: &Path) -> Result<Option<Archive>> {
    let archives = scan(dir)?;
    Ok(archives
        .into_iter()
        .filter(|a| !a.is_incremental)
        .max_by_key(|a| a.created))
}

/// Read `*.zip` entries without creating the directory; absent directory
/// means no archives.
fn scan(dir: &Path) -> Result<Vec<Archive>> {
    let reader = match std::fs::read_dir(dir) {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(classify_io(e, "unable to read archive directory", dir)),
    };

    let mut archives = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|e| classify_io(e, "unable to read archive directory", dir))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(ARCHIVE_EXT) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };
        let created = meta
            .modified()
            .map_err(|e| classify_io(e, "unable to read mtime", &path))?;

        let parsed = parse_archive_name(name);
        archives.push(Archive {
            name: name.to_string(),
            is_incremental: name.contains(UPDATE_MARKER),
            base_archive: parsed.base_archive,
            branch: parsed.branch,
            git_hash: parsed.hash,
            note: parsed.note,
            verification: None,
            created,
            path,
        });
    }
    Ok(archives)
}
