use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bkp_utils::error::classify_io;
use bkp_utils::{CancelToken, Result, IO_CHUNK_SIZE};

use crate::entry::SnapshotEntry;

/// Directory-vs-archive identity.
///
/// Archives carry no directory entries, so the filesystem side drops its
/// directories before the element-wise comparison. Hashes are authoritative;
/// sizes are ignored. Both inputs must already be in canonical order and
/// share the exclusion set they were produced under.
pub fn snapshots_equal(fs_entries: &[SnapshotEntry], archive_entries: &[SnapshotEntry]) -> bool {
    let mut fs_files = fs_entries.iter().filter(|e| !e.is_dir);
    let mut archive_files = archive_entries.iter().filter(|e| !e.is_dir);
    loop {
        match (fs_files.next(), archive_files.next()) {
            (None, None) => return true,
            (Some(a), Some(b)) => {
                if a.rel_path != b.rel_path || a.content_hash != b.content_hash {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// File-vs-backup identity: size gate, then a streamed byte-wise compare.
pub fn files_identical(a: &Path, b: &Path, cancel: &CancelToken) -> Result<bool> {
    let meta_a = std::fs::metadata(a).map_err(|e| classify_io(e, "unable to stat", a))?;
    let meta_b = std::fs::metadata(b).map_err(|e| classify_io(e, "unable to stat", b))?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let open = |path: &Path| -> Result<BufReader<File>> {
        let file = File::open(path).map_err(|e| classify_io(e, "unable to open", path))?;
        Ok(BufReader::with_capacity(IO_CHUNK_SIZE, file))
    };
    let mut reader_a = open(a)?;
    let mut reader_b = open(b)?;

    let mut buf_a = vec![0u8; IO_CHUNK_SIZE];
    let mut buf_b = vec![0u8; IO_CHUNK_SIZE];
    loop {
        cancel.check()?;
        let n_a = read_full(&mut reader_a, &mut buf_a, a)?;
        let n_b = read_full(&mut reader_b, &mut buf_b, b)?;
        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows; short only at end of file.
fn read_full(reader: &mut impl Read, buf: &mut [u8], context: &Path) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .map_err(|e| classify_io(e, "unable to read", context))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
