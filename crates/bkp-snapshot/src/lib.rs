//! Ordered, hashed manifests of directory trees, and the identity checks
//! built on them.

pub mod compare;
pub mod entry;
pub mod walk;

pub use compare::{files_identical, snapshots_equal};
pub use entry::SnapshotEntry;
pub use walk::{collect_files, snapshot_dir, FileMeta, WalkOptions};
