use std::fs::File;
use std::io::Read;
use std::path::Path;

use bkp_hash::Sha256Hasher;
use bkp_snapshot::entry::{sort_entries, SnapshotEntry};
use bkp_utils::error::classify_io;
use bkp_utils::{CancelToken, Result, IO_CHUNK_SIZE};

use crate::manifest::CHECKSUM_ENTRY_NAME;
use crate::zip_error;

/// Hashed manifest of an archive's contents.
///
/// Directory entries are not emitted (the writer never creates them) and
/// the embedded checksum manifest is archive metadata, not tree content, so
/// it is omitted as well. Each file entry is hashed over its uncompressed
/// bytes, streamed in fixed chunks. The result is sorted by entry name.
pub fn snapshot_archive(path: &Path, cancel: &CancelToken) -> Result<Vec<SnapshotEntry>> {
    let file = File::open(path).map_err(|e| classify_io(e, "unable to open archive", path))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| zip_error(e, "unable to read archive", path))?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        cancel.check()?;
        let mut entry = archive
            .by_index(index)
            .map_err(|e| zip_error(e, "unable to read archive entry", path))?;
        if entry.is_dir() || entry.name() == CHECKSUM_ENTRY_NAME {
            continue;
        }

        let rel_path = entry.name().to_string();
        let size = entry.size();
        let mut hasher = Sha256Hasher::new();
        let mut chunk = vec![0u8; IO_CHUNK_SIZE];
        loop {
            cancel.check()?;
            let n = entry
                .read(&mut chunk)
                .map_err(|e| classify_io(e, "unable to read archive entry", path))?;
            if n == 0 {
                break;
            }
            hasher.update(&chunk[..n]);
        }
        entries.push(SnapshotEntry::file(rel_path, size, hasher.finalize_hex()));
    }

    sort_entries(&mut entries);
    Ok(entries)
}
