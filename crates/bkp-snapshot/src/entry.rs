/// One element of a tree snapshot.
///
/// Entries are sorted by `rel_path` using byte-wise ordering and are unique
/// within a snapshot. `content_hash` is a 64-character lowercase SHA-256 hex
/// digest for files and empty for directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub rel_path: String,
    pub is_dir: bool,
    pub size: u64,
    pub content_hash: String,
}

impl SnapshotEntry {
    pub fn dir(rel_path: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            is_dir: true,
            size: 0,
            content_hash: String::new(),
        }
    }

    pub fn file(rel_path: impl Into<String>, size: u64, content_hash: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            is_dir: false,
            size,
            content_hash: content_hash.into(),
        }
    }
}

/// Sort entries into the canonical byte-wise order.
pub fn sort_entries(entries: &mut [SnapshotEntry]) {
    entries.sort_unstable_by(|a, b| a.rel_path.as_bytes().cmp(b.rel_path.as_bytes()));
}
