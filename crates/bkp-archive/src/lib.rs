//! Archive creation, verification and listing.
//!
//! Archives are ZIP files whose entries are Deflate-compressed regular
//! files plus one embedded checksum manifest. A published archive is never
//! mutated; everything is written to a sibling temp file first and renamed
//! into place.

pub mod list;
pub mod manifest;
pub mod name;
pub mod snapshot;
pub mod verify;
pub mod writer;

pub use list::{latest_archive, latest_full_archive, list_archives, Archive};
pub use manifest::{ChecksumManifest, CHECKSUM_ENTRY_NAME};
pub use name::{
    backup_name, full_archive_name, incremental_archive_name, parse_archive_name, NameParts,
    ParsedName,
};
pub use snapshot::snapshot_archive;
pub use verify::{sidecar_path, verify_archive, VerificationStatus};
pub use writer::{create_full, create_incremental, ArchivePlan, WriteOutcome};

use std::path::Path;

use bkp_utils::error::{classify_io, Error, ErrorKind};

/// Marker in archive names that flags an incremental archive.
pub const UPDATE_MARKER: &str = "_update=";

/// Extension all archives carry.
pub const ARCHIVE_EXT: &str = ".zip";

pub(crate) fn zip_error(err: zip::result::ZipError, context: &str, path: &Path) -> Error {
    match err {
        zip::result::ZipError::Io(io_err) => classify_io(io_err, context, path),
        other => Error::new(
            ErrorKind::Io,
            format!("{context}: {}: {other}", path.display()),
        )
        .with_path(path),
    }
}
